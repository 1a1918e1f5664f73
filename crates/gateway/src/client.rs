//! Graphite Client - one Graphite backend
//!
//! Ties the pieces of one backend together:
//!
//! ```text
//! write: samples -> PathResolver -> Carbon lines -> buffers -> CarbonTransport
//! read:  ReadRequest -> QueryTranslator -> Graphite-web -> ReadResponse
//! ```
//!
//! A backend may be write-only (no read URL), read-only (no Carbon address)
//! or both.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use cinder_carbon::{CarbonTransport, TransportConfig, TransportKind, prepare};
use cinder_config::{GraphiteConfig, ReadOptions, WriteOptions};
use cinder_paths::{PathResolver, Sample, to_datapoints};
use cinder_query::{Fetcher, HttpFetcher, QueryTranslator, ReadRequest, ReadResponse};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, Result};

/// Reply for a backend without a Carbon address
pub const SKIPPED_MESSAGE: &str = "Skipped: Not set carbon address.";

/// Reply for a completed write
pub const DONE_MESSAGE: &str = "Done.";

/// Result of one write on one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The backend has no Carbon address
    Skipped,
    /// Lines that would have been sent
    DryRun(String),
    /// Bytes written to the socket
    Sent { bytes: usize },
}

impl WriteOutcome {
    /// Message reported to the caller
    pub fn message(&self) -> String {
        match self {
            Self::Skipped => SKIPPED_MESSAGE.to_string(),
            Self::DryRun(lines) => lines.clone(),
            Self::Sent { .. } => DONE_MESSAGE.to_string(),
        }
    }
}

/// Per-backend sample counters
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Samples received for writing
    pub samples_received: AtomicU64,

    /// Samples dropped because they could not be translated
    pub samples_ignored: AtomicU64,

    /// Samples whose buffers were all sent
    pub samples_sent: AtomicU64,

    /// Samples whose send failed
    pub samples_failed: AtomicU64,

    /// Samples returned by reads
    pub samples_read: AtomicU64,

    /// Reads that failed
    pub reads_failed: AtomicU64,
}

impl ClientMetrics {
    /// Get snapshot of metrics
    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_ignored: self.samples_ignored.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            samples_failed: self.samples_failed.load(Ordering::Relaxed),
            samples_read: self.samples_read.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of client metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
    pub samples_received: u64,
    pub samples_ignored: u64,
    pub samples_sent: u64,
    pub samples_failed: u64,
    pub samples_read: u64,
    pub reads_failed: u64,
}

/// One Graphite backend
pub struct GraphiteClient {
    name: String,
    transport_kind: TransportKind,
    resolver: PathResolver,
    transport: Option<CarbonTransport>,
    translator: Option<QueryTranslator>,
    read_timeout: Duration,
    metrics: ClientMetrics,
}

impl std::fmt::Debug for GraphiteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphiteClient")
            .field("name", &self.name)
            .field("writer", &self.transport.as_ref().map(|t| &t.config().address))
            .field("reader", &self.translator.as_ref().map(|t| t.base_url()))
            .finish()
    }
}

impl GraphiteClient {
    /// Build a backend from its settings
    ///
    /// Compiles every rule and template, so a bad template fails here rather
    /// than on the first sample.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Path` when a rule or template does not compile.
    pub fn new(
        name: impl Into<String>,
        graphite: &GraphiteConfig,
        read: &ReadOptions,
        write: &WriteOptions,
    ) -> Result<Self> {
        let name = name.into();
        let resolver = PathResolver::from_config(graphite)?;

        let transport = (!graphite.write.carbon_address.is_empty()).then(|| {
            CarbonTransport::new(TransportConfig::from_config(&graphite.write, write.timeout))
        });
        let translator = (!graphite.read.url.is_empty()).then(|| {
            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new());
            QueryTranslator::from_config(graphite, read, fetcher)
        });

        tracing::debug!(
            backend = %name,
            rules = resolver.rules().len(),
            writer = transport.is_some(),
            reader = translator.is_some(),
            "graphite backend ready"
        );

        Ok(Self {
            name,
            transport_kind: graphite.write.carbon_transport,
            resolver,
            transport,
            translator,
            read_timeout: read.timeout,
            metrics: ClientMetrics::default(),
        })
    }

    /// Replace the reader's HTTP access
    #[must_use]
    pub fn with_translator(mut self, translator: QueryTranslator) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Backend name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether writes go anywhere
    pub fn is_writer(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether reads are served
    pub fn is_reader(&self) -> bool {
        self.translator.is_some()
    }

    /// Path resolver used for writes
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Carbon transport, if writes are configured
    pub fn transport(&self) -> Option<&CarbonTransport> {
        self.transport.as_ref()
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Where this backend sends or reads, for logs
    pub async fn target(&self) -> String {
        match (&self.transport, &self.translator) {
            (Some(transport), _) => transport.target().await,
            (None, Some(translator)) => translator.base_url().to_string(),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Start the path cache sweeper, if the cache is enabled
    pub fn start(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        self.resolver
            .cache()
            .map(|cache| cache.spawn_sweeper(cancel))
    }

    /// Translate samples into send buffers
    ///
    /// Samples that cannot be translated (non-finite value, template error)
    /// are logged, counted and skipped; the rest of the batch goes on.
    pub fn prepare(&self, samples: &[Sample], prefix: Option<&str>) -> Vec<Bytes> {
        let mut lines = Vec::with_capacity(samples.len());
        for sample in samples {
            match to_datapoints(&self.resolver, sample, prefix) {
                Ok(datapoints) => lines.extend(datapoints),
                Err(e) => {
                    self.metrics.samples_ignored.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        backend = %self.name,
                        labels = ?sample.labels,
                        error = %e,
                        "ignoring sample"
                    );
                }
            }
        }
        prepare(self.transport_kind, &lines)
    }

    /// Write a batch of samples
    ///
    /// With `dry_run` the encoded lines are returned instead of sent.
    ///
    /// # Errors
    ///
    /// Returns the transport error when sending fails.
    pub async fn write(
        &self,
        samples: &[Sample],
        prefix: Option<&str>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let Some(transport) = &self.transport else {
            return Ok(WriteOutcome::Skipped);
        };

        self.metrics
            .samples_received
            .fetch_add(samples.len() as u64, Ordering::Relaxed);
        let buffers = self.prepare(samples, prefix);

        if dry_run {
            let lines = buffers
                .iter()
                .map(|b| String::from_utf8_lossy(b))
                .collect::<String>();
            return Ok(WriteOutcome::DryRun(lines));
        }

        tracing::debug!(
            backend = %self.name,
            samples = samples.len(),
            buffers = buffers.len(),
            "writing to carbon"
        );

        match transport.send(&buffers, cancel).await {
            Ok(bytes) => {
                self.metrics
                    .samples_sent
                    .fetch_add(samples.len() as u64, Ordering::Relaxed);
                Ok(WriteOutcome::Sent { bytes })
            }
            Err(e) => {
                self.metrics
                    .samples_failed
                    .fetch_add(samples.len() as u64, Ordering::Relaxed);
                Err(e.into())
            }
        }
    }

    /// Answer a remote-read request, bounded by the read timeout
    ///
    /// # Errors
    ///
    /// `NotReadable` without a read URL, `ReadTimeout` when the timeout
    /// elapses, or the query error.
    pub async fn read(&self, request: &ReadRequest, prefix: Option<&str>) -> Result<ReadResponse> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| GatewayError::NotReadable(self.name.clone()))?;

        let result = match timeout(self.read_timeout, translator.read(request, prefix)).await {
            Ok(result) => result.map_err(GatewayError::from),
            Err(_) => Err(GatewayError::ReadTimeout {
                backend: self.name.clone(),
            }),
        };

        match &result {
            Ok(response) => {
                self.metrics
                    .samples_read
                    .fetch_add(response.sample_count() as u64, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.reads_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// Close the Carbon connection
    pub async fn shutdown(&self) {
        if let Some(transport) = &self.transport {
            transport.shutdown().await;
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
