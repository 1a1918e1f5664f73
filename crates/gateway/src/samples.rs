//! JSON sample input
//!
//! Accepts the Prometheus JSON sample shape, so batches can be tested without
//! the remote-write envelope:
//!
//! ```json
//! [
//!   {"metric": {"__name__": "up", "job": "node"}, "value": [1700000000.5, "1"]}
//! ]
//! ```
//!
//! The timestamp is in seconds (fractional allowed); the value is a string so
//! `NaN`, `+Inf` and `-Inf` can be expressed.

use std::collections::BTreeMap;
use std::sync::Arc;

use cinder_paths::{LabelSet, Sample};
use serde::Deserialize;

use crate::error::{GatewayError, Result};

#[derive(Debug, Deserialize)]
struct JsonSample {
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// Parse a JSON array of samples
///
/// # Errors
///
/// Returns `GatewayError::InvalidInput` for malformed JSON or a value that is
/// not a number.
pub fn parse_samples(input: &str) -> Result<Vec<Sample>> {
    let raw: Vec<JsonSample> =
        serde_json::from_str(input).map_err(|e| GatewayError::InvalidInput(e.to_string()))?;

    raw.into_iter()
        .map(|sample| {
            let (seconds, value) = sample.value;
            let value: f64 = value.trim().parse().map_err(|_| {
                GatewayError::InvalidInput(format!("sample value {value:?} is not a number"))
            })?;
            let labels = Arc::new(LabelSet::from(sample.metric));
            Ok(Sample::new(labels, value, (seconds * 1000.0).round() as i64))
        })
        .collect()
}
