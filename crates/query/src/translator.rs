//! Remote-read queries against Graphite-web
//!
//! A query is answered in two steps: find the Graphite targets it covers,
//! then fetch each target's datapoints over the query window.
//!
//! # Modes
//!
//! - **Discovery** (dotted paths): expand `prefix.name.**` with
//!   `/metrics/expand`, parse each leaf back into labels and keep the leaves
//!   every matcher accepts. One render request per leaf.
//! - **Tags**: turn every matcher into a `seriesByTag` clause and issue a
//!   single render request. Labels come from the returned tags.
//!
//! Render requests run concurrently, at most [`MAX_FETCH_WORKERS`] at a time.
//! A target that fails to fetch or parse is logged and skipped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cinder_config::{GraphiteConfig, ReadOptions};
use cinder_paths::{GRAPHITE_NAME_TAG, METRIC_NAME_LABEL, escape, labels_from_path, labels_from_tags};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{QueryError, Result};
use crate::fetcher::Fetcher;
use crate::interpolate::interpolate;
use crate::types::{
    CompiledMatcher, MatchType, Point, Query, QueryResult, ReadRequest, ReadResponse, TimeSeries,
};

/// Render requests in flight per query
pub const MAX_FETCH_WORKERS: usize = 10;

/// How targets are found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Expand dotted paths and parse them back into labels
    #[default]
    Discovery,
    /// Query tagged series with `seriesByTag`
    Tags,
}

/// `/metrics/expand` response
#[derive(Debug, Deserialize)]
struct ExpandResponse {
    #[serde(default)]
    results: Vec<String>,
}

/// One series of a `/render` response
#[derive(Debug, Deserialize)]
struct RenderSeries {
    target: String,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    datapoints: Vec<(Option<f64>, i64)>,
}

/// Translates remote-read queries into Graphite-web requests
#[derive(Clone)]
pub struct QueryTranslator {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
    default_prefix: String,
    mode: ReadMode,
    read_delay: Duration,
    max_point_delta: Duration,
}

impl std::fmt::Debug for QueryTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTranslator")
            .field("base_url", &self.base_url)
            .field("default_prefix", &self.default_prefix)
            .field("mode", &self.mode)
            .finish()
    }
}

impl QueryTranslator {
    /// Create a discovery-mode translator for the Graphite-web at `base_url`
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_prefix: String::new(),
            mode: ReadMode::Discovery,
            read_delay: Duration::ZERO,
            max_point_delta: Duration::ZERO,
        }
    }

    /// Build from backend and read settings
    pub fn from_config(
        graphite: &GraphiteConfig,
        read: &ReadOptions,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self::new(fetcher, graphite.read.url.clone())
            .with_prefix(graphite.default_prefix.clone())
            .with_tags(graphite.enable_tags)
            .with_read_delay(read.delay)
            .with_max_point_delta(graphite.read.max_point_delta)
    }

    /// Set the prefix used when a request brings none
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = prefix.into();
        self
    }

    /// Query tagged series instead of dotted paths
    #[must_use]
    pub fn with_tags(mut self, enabled: bool) -> Self {
        self.mode = if enabled {
            ReadMode::Tags
        } else {
            ReadMode::Discovery
        };
        self
    }

    /// Never request points newer than `now - delay`
    #[must_use]
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Interpolate gaps wider than `delta`; zero disables
    #[must_use]
    pub fn with_max_point_delta(mut self, delta: Duration) -> Self {
        self.max_point_delta = delta;
        self
    }

    /// Get the read mode
    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    /// Graphite-web base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Window in epoch seconds for a query, or `None` if it is empty
    ///
    /// The end is clamped to `now_secs - read_delay`.
    pub fn window(&self, query: &Query, now_secs: i64) -> Option<(i64, i64)> {
        let from = query.start_timestamp_ms / 1000;
        let latest = now_secs - self.read_delay.as_secs() as i64;
        let until = (query.end_timestamp_ms / 1000).min(latest);
        (until >= from).then_some((from, until))
    }

    /// `/metrics/expand` URL for a glob
    pub fn expand_url(&self, glob: &str) -> String {
        format!(
            "{}/metrics/expand?{}",
            self.base_url,
            encode_query(&mut [
                ("format", "json".to_string()),
                ("leavesOnly", "1".to_string()),
                ("query", glob.to_string()),
            ])
        )
    }

    /// `/render` URL for one target over `[from, until]`
    pub fn render_url(&self, target: &str, from: i64, until: i64) -> String {
        format!(
            "{}/render/?{}",
            self.base_url,
            encode_query(&mut [
                ("format", "json".to_string()),
                ("from", from.to_string()),
                ("target", target.to_string()),
                ("until", until.to_string()),
            ])
        )
    }

    /// Graphite targets covering a query
    ///
    /// # Errors
    ///
    /// `InvalidQuery` without a metric-name matcher (in discovery mode, without
    /// a metric-name equality), or with a bad pattern. Discovery mode also
    /// fails if the expand request does.
    pub async fn targets(&self, query: &Query, prefix: &str) -> Result<Vec<String>> {
        match self.mode {
            ReadMode::Tags => Ok(vec![tag_target(query, prefix)?]),
            ReadMode::Discovery => self.discover_targets(query, prefix).await,
        }
    }

    async fn discover_targets(&self, query: &Query, prefix: &str) -> Result<Vec<String>> {
        // The glob needs a literal name; other name matchers only filter leaves
        let name = query
            .matchers
            .iter()
            .find(|m| m.name == METRIC_NAME_LABEL && m.kind == MatchType::Equal)
            .map(|m| m.value.as_str())
            .ok_or_else(missing_name)?;
        let matchers = query
            .matchers
            .iter()
            .map(|m| m.compile())
            .collect::<Result<Vec<CompiledMatcher>>>()?;

        let glob = format!("{prefix}{}.**", escape(name));
        let body = self.fetcher.fetch(&self.expand_url(&glob)).await?;
        let expanded: ExpandResponse = serde_json::from_slice(&body)?;

        let targets: Vec<String> = expanded
            .results
            .into_iter()
            .filter(|leaf| match labels_from_path(leaf, prefix) {
                Ok(labels) => matchers.iter().all(|m| m.matches(&labels)),
                Err(e) => {
                    tracing::debug!(leaf = %leaf, error = %e, "skipping unparsable graphite leaf");
                    false
                }
            })
            .collect();

        tracing::debug!(glob = %glob, targets = targets.len(), "expanded graphite query");
        Ok(targets)
    }

    /// Fetch and parse one target over `[from, until]`
    pub async fn fetch_series(
        &self,
        target: &str,
        from: i64,
        until: i64,
        prefix: &str,
    ) -> Result<Vec<TimeSeries>> {
        fetch_series(
            self.fetcher.as_ref(),
            &self.render_url(target, from, until),
            self.mode,
            prefix,
            self.max_point_delta_ms(),
        )
        .await
    }

    /// Answer one query
    ///
    /// `prefix` overrides the configured prefix when non-empty. Series keep
    /// the order of their targets.
    pub async fn query(&self, query: &Query, prefix: Option<&str>) -> Result<Vec<TimeSeries>> {
        let prefix = match prefix {
            Some(p) if !p.is_empty() => p,
            _ => self.default_prefix.as_str(),
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let Some((from, until)) = self.window(query, now) else {
            tracing::debug!(
                start_ms = query.start_timestamp_ms,
                end_ms = query.end_timestamp_ms,
                "query window ends before it starts, nothing to read"
            );
            return Ok(Vec::new());
        };

        let targets = self.targets(query, prefix).await?;
        let count = targets.len();

        let semaphore = Arc::new(Semaphore::new(MAX_FETCH_WORKERS));
        let mut tasks = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let url = self.render_url(&target, from, until);
            let mode = self.mode;
            let prefix = prefix.to_string();
            let max_delta_ms = self.max_point_delta_ms();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = fetch_series(fetcher.as_ref(), &url, mode, &prefix, max_delta_ms).await;
                (index, target, result)
            });
        }

        let mut slots: Vec<Option<Vec<TimeSeries>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(series))) => slots[index] = Some(series),
                Ok((_, target, Err(e))) => {
                    tracing::warn!(
                        series = %target,
                        error = %e,
                        "failed to fetch graphite series, skipping"
                    );
                }
                Err(e) => tracing::warn!(error = %e, "graphite fetch task failed"),
            }
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }

    /// Answer every query of a request, one result per query
    pub async fn read(&self, request: &ReadRequest, prefix: Option<&str>) -> Result<ReadResponse> {
        let mut results = Vec::with_capacity(request.queries.len());
        for query in &request.queries {
            results.push(QueryResult {
                timeseries: self.query(query, prefix).await?,
            });
        }
        Ok(ReadResponse { results })
    }

    fn max_point_delta_ms(&self) -> i64 {
        self.max_point_delta.as_millis() as i64
    }
}

/// `seriesByTag` target for a query
///
/// Each matcher becomes one quoted clause; the metric name is queried as the
/// `name` tag with the storage prefix in front. Regex clauses get the prefix
/// escaped so its dots match only dots.
///
/// # Errors
///
/// `InvalidQuery` when no matcher targets the metric name.
pub fn tag_target(query: &Query, prefix: &str) -> Result<String> {
    if query.matcher(METRIC_NAME_LABEL).is_none() {
        return Err(missing_name());
    }

    let clauses: Vec<String> = query
        .matchers
        .iter()
        .map(|m| {
            let (name, value) = if m.name == METRIC_NAME_LABEL {
                let prefix = match m.kind {
                    MatchType::Regex | MatchType::NotRegex => regex::escape(prefix),
                    MatchType::Equal | MatchType::NotEqual => prefix.to_string(),
                };
                (GRAPHITE_NAME_TAG, format!("{prefix}{}", m.value))
            } else {
                (m.name.as_str(), m.value.clone())
            };
            match m.kind {
                MatchType::Equal => format!("\"{name}={value}\""),
                MatchType::NotEqual => format!("\"{name}!={value}\""),
                MatchType::Regex => format!("\"{name}=~^({value})$\""),
                MatchType::NotRegex => format!("\"{name}!=~^({value})$\""),
            }
        })
        .collect();

    Ok(format!("seriesByTag({})", clauses.join(",")))
}

fn missing_name() -> QueryError {
    QueryError::invalid(format!("no {METRIC_NAME_LABEL} label provided"))
}

/// Query string with keys sorted and values percent-encoded
fn encode_query(params: &mut [(&str, String)]) -> String {
    params.sort_by(|a, b| a.0.cmp(b.0));
    params
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

async fn fetch_series(
    fetcher: &dyn Fetcher,
    url: &str,
    mode: ReadMode,
    prefix: &str,
    max_delta_ms: i64,
) -> Result<Vec<TimeSeries>> {
    let body = fetcher.fetch(url).await?;
    let rendered: Vec<RenderSeries> = serde_json::from_slice(&body)?;

    rendered
        .into_iter()
        .map(|series| -> Result<TimeSeries> {
            let labels = match (&series.tags, mode) {
                (Some(tags), ReadMode::Tags) => {
                    labels_from_tags(tags.iter().map(|(k, v)| (k.as_str(), v.as_str())), prefix)
                }
                _ => labels_from_path(&series.target, prefix)?,
            };

            // Null values are gaps, not zeros
            let points: Vec<Point> = series
                .datapoints
                .iter()
                .filter_map(|&(value, ts)| value.map(|v| Point::new(v, ts * 1000)))
                .collect();

            Ok(TimeSeries {
                labels,
                samples: interpolate(&points, max_delta_ms),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "translator_test.rs"]
mod tests;
