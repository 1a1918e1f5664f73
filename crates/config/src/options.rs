//! Request-level read and write options
//!
//! These apply to every backend, as opposed to the per-backend settings in
//! [`crate::GraphiteConfig`].

use serde::Deserialize;
use std::time::Duration;

/// Options for remote-read requests
///
/// # Example
///
/// ```toml
/// [read]
/// timeout = "30s"
/// delay = "10m"
/// ignore_error = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Maximum duration of one read request
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Samples more recent than this are never requested
    /// Default: 1h
    #[serde(with = "humantime_serde")]
    pub delay: Duration,

    /// Answer failed reads with an empty result instead of an error
    /// Default: true
    pub ignore_error: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            delay: Duration::from_secs(60 * 60),
            ignore_error: true,
        }
    }
}

/// Options for remote-write requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Dial and write timeout for the Carbon socket
    /// Default: 5m
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_defaults() {
        let read = ReadOptions::default();
        assert_eq!(read.timeout, Duration::from_secs(300));
        assert_eq!(read.delay, Duration::from_secs(3600));
        assert!(read.ignore_error);
    }

    #[test]
    fn test_partial_read_options_keep_defaults() {
        let read: ReadOptions = toml::from_str("delay = \"10m\"").unwrap();
        assert_eq!(read.delay, Duration::from_secs(600));
        assert_eq!(read.timeout, Duration::from_secs(300));
        assert!(read.ignore_error);
    }

    #[test]
    fn test_write_timeout() {
        let write: WriteOptions = toml::from_str("timeout = \"250ms\"").unwrap();
        assert_eq!(write.timeout, Duration::from_millis(250));
    }
}
