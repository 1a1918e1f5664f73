//! Carbon plaintext line encoding
//!
//! One line per path: `<path> <value> <timestamp>\n`, with the value printed
//! with six decimals and the timestamp in whole seconds.

use crate::error::{PathError, Result};
use crate::labels::Sample;
use crate::resolver::PathResolver;
use std::fmt::Write;

/// Append one line to `out`
pub fn write_line(out: &mut String, path: &str, value: f64, timestamp_ms: i64) {
    let _ = writeln!(
        out,
        "{} {:.6} {:.0}",
        path,
        value,
        timestamp_ms as f64 / 1000.0
    );
}

/// Encode every path of one sample
///
/// # Errors
///
/// Returns `PathError::InvalidSampleValue` for NaN and infinite values, or
/// the resolver's error. Nothing is returned on error.
pub fn to_datapoints(
    resolver: &PathResolver,
    sample: &Sample,
    prefix_override: Option<&str>,
) -> Result<Vec<String>> {
    if !sample.value.is_finite() {
        return Err(PathError::InvalidSampleValue {
            value: sample.value,
        });
    }

    let paths = resolver.resolve(&sample.labels, prefix_override)?;
    Ok(paths
        .iter()
        .map(|path| {
            let mut line = String::with_capacity(path.len() + 32);
            write_line(&mut line, path, sample.value, sample.timestamp_ms);
            line
        })
        .collect())
}
