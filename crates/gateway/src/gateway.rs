//! Gateway - fan-out over every configured backend
//!
//! Writes go to every backend concurrently and each reports its own outcome;
//! one failing backend never fails the others. Reads are served by the
//! single backend with a read URL.
//!
//! ```text
//!                      ┌──▶ GraphiteClient "graphite"  ──▶ "Done."
//! write(samples) ──────┼──▶ GraphiteClient "replica"   ──▶ "failed to dial carbon at ..."
//!                      └──▶ GraphiteClient "read-only" ──▶ "Skipped: Not set carbon address."
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cinder_config::{Config, ReadOptions};
use cinder_paths::Sample;
use cinder_query::{ReadRequest, ReadResponse};
use tokio::task::{Id, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::client::{GraphiteClient, WriteOutcome};
use crate::error::{GatewayError, Result};

/// Every backend of one configuration
#[derive(Debug)]
pub struct Gateway {
    clients: Vec<Arc<GraphiteClient>>,
    read: ReadOptions,
    cancel: CancellationToken,
}

impl Gateway {
    /// Create a gateway over already built backends
    pub fn new(clients: Vec<GraphiteClient>, read: ReadOptions) -> Self {
        Self {
            clients: clients.into_iter().map(Arc::new).collect(),
            read,
            cancel: CancellationToken::new(),
        }
    }

    /// Build every backend of a configuration
    ///
    /// # Errors
    ///
    /// Returns the first backend that fails to build.
    pub fn from_config(config: &Config) -> Result<Self> {
        let clients = config
            .backends()
            .map(|(name, graphite)| GraphiteClient::new(name, graphite, &config.read, &config.write))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(backends = clients.len(), "gateway configured");
        Ok(Self::new(clients, config.read.clone()))
    }

    /// Configured backends, in configuration order
    pub fn clients(&self) -> &[Arc<GraphiteClient>] {
        &self.clients
    }

    /// Start background tasks of every backend
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.clients
            .iter()
            .filter_map(|client| client.start(self.cancel.child_token()))
            .collect()
    }

    /// Write a batch to every backend
    ///
    /// Returns one message per backend name: the outcome message on success,
    /// the error text on failure.
    pub async fn write(
        &self,
        samples: Arc<[Sample]>,
        prefix: Option<String>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> BTreeMap<String, String> {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::with_capacity(self.clients.len());
        for client in &self.clients {
            let client = Arc::clone(client);
            let samples = Arc::clone(&samples);
            let prefix = prefix.clone();
            let cancel = cancel.clone();
            let name = client.name().to_string();

            let handle = tasks.spawn(async move {
                client
                    .write(&samples, prefix.as_deref(), dry_run, &cancel)
                    .await
            });
            names.insert(handle.id(), name);
        }

        collect_replies(tasks, names).await
    }

    /// Answer a remote-read request from the single reader
    ///
    /// With `ignore_error` set, a failed read is answered with one empty
    /// result instead of the error.
    ///
    /// # Errors
    ///
    /// `ReaderCount` unless exactly one backend has a read URL, otherwise the
    /// reader's error when `ignore_error` is off.
    pub async fn read(&self, request: &ReadRequest, prefix: Option<&str>) -> Result<ReadResponse> {
        let mut readers = self.clients.iter().filter(|c| c.is_reader());
        let reader = match (readers.next(), readers.count()) {
            (Some(reader), 0) => reader,
            (first, rest) => {
                return Err(GatewayError::ReaderCount(usize::from(first.is_some()) + rest));
            }
        };

        match reader.read(request, prefix).await {
            Ok(response) => Ok(response),
            Err(e) if self.read.ignore_error => {
                tracing::warn!(backend = %reader.name(), error = %e, "read failed, answering empty");
                Ok(ReadResponse::empty())
            }
            Err(e) => {
                tracing::warn!(backend = %reader.name(), error = %e, "read failed");
                Err(e)
            }
        }
    }

    /// Stop background tasks and close every Carbon connection
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for client in &self.clients {
            client.shutdown().await;
        }
    }
}

/// Wait for every write task and key its reply by backend name
///
/// A task that panicked or was cancelled still gets an entry.
async fn collect_replies(
    mut tasks: JoinSet<Result<WriteOutcome>>,
    mut names: HashMap<Id, String>,
) -> BTreeMap<String, String> {
    let mut replies = BTreeMap::new();
    while let Some(joined) = tasks.join_next_with_id().await {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result.map_err(|e| e.to_string())),
            Err(e) => (e.id(), Err(format!("write task failed: {e}"))),
        };
        let name = names.remove(&id).unwrap_or_else(|| format!("task-{id}"));
        match result {
            Ok(outcome) => {
                replies.insert(name, outcome.message());
            }
            Err(message) => {
                tracing::warn!(backend = %name, error = %message, "write failed");
                replies.insert(name, message);
            }
        }
    }
    replies
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
