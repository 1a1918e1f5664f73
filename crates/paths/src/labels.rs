//! Label sets and samples
//!
//! A `LabelSet` is backed by a sorted map, so equality, hashing and the
//! cache fingerprint never depend on insertion order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use xxhash_rust::xxh3::Xxh3;

/// Reserved label holding the metric name
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Mapping from label name to label value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label, builder style
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a label, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Value of a label
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of the metric name label
    #[inline]
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME_LABEL)
    }

    /// Labels in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no labels
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Order-independent 64-bit hash of every name and value
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = Xxh3::new();
        for (name, value) in &self.0 {
            hasher.update(name.as_bytes());
            hasher.update(&[0xff]);
            hasher.update(value.as_bytes());
            hasher.update(&[0xff]);
        }
        hasher.digest()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One decoded sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Identity of the series
    pub labels: Arc<LabelSet>,

    /// Sample value
    pub value: f64,

    /// Timestamp in milliseconds since the epoch
    pub timestamp_ms: i64,
}

impl Sample {
    /// Create a new sample
    pub fn new(labels: impl Into<Arc<LabelSet>>, value: f64, timestamp_ms: i64) -> Self {
        Self {
            labels: labels.into(),
            value,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let a = LabelSet::new()
            .with(METRIC_NAME_LABEL, "up")
            .with("job", "node")
            .with("instance", "a:9100");
        let b: LabelSet = [
            ("instance", "a:9100"),
            ("job", "node"),
            (METRIC_NAME_LABEL, "up"),
        ]
        .into_iter()
        .collect();

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_separates_names_and_values() {
        let a = LabelSet::new().with("ab", "c");
        let b = LabelSet::new().with("a", "bc");
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_metric_name() {
        let labels = LabelSet::new().with(METRIC_NAME_LABEL, "test");
        assert_eq!(labels.metric_name(), Some("test"));
        assert_eq!(LabelSet::new().metric_name(), None);
    }

    #[test]
    fn test_deserialize_from_json_object() {
        let labels: LabelSet =
            serde_json::from_str(r#"{"__name__":"up","job":"node"}"#).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("job"), Some("node"));
    }
}
