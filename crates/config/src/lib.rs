//! Cinder Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! A config only needs the addresses it actually uses.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use cinder_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[graphite.write]\ncarbon_address = \"localhost:2003\"").unwrap();
//! assert_eq!(config.backends().count(), 1);
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [graphite.write]
//! carbon_address = "carbon:2003"
//!
//! [graphite.read]
//! url = "http://graphite-web:8080"
//! ```
//!
//! # Multiple Backends
//!
//! The `[graphite]` section is the backend named `graphite`. More backends
//! are declared as an array:
//!
//! ```toml
//! [[backends]]
//! name = "mirror"
//! default_prefix = "mirror."
//!
//! [backends.write]
//! carbon_address = "carbon-mirror:2003"
//! carbon_transport = "udp"
//! ```

mod error;
mod graphite;
mod logging;
mod options;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use error::{ConfigError, Result};
pub use graphite::{
    CarbonTransport, CompressType, GraphiteConfig, GraphiteReadConfig, GraphiteWriteConfig,
    Lz4BlockSize, Lz4Preferences, NamedBackendConfig, RuleConfig,
};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use options::{ReadOptions, WriteOptions};

use serde::Deserialize;

/// Name under which the `[graphite]` section is reported
pub const PRIMARY_BACKEND: &str = "graphite";

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Remote-read request options
    pub read: ReadOptions,

    /// Remote-write request options
    pub write: WriteOptions,

    /// Primary Graphite backend
    pub graphite: GraphiteConfig,

    /// Additional Graphite backends
    pub backends: Vec<NamedBackendConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks for:
    /// - Duplicate backend names
    /// - Declared backends with neither a Carbon address nor a read URL
    /// - Rule regexes that do not compile
    /// - Zero-length intervals where they would spin
    fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Iterate over every configured backend as `(name, settings)`
    ///
    /// The primary `[graphite]` section is skipped when it has neither a
    /// Carbon address nor a read URL.
    pub fn backends(&self) -> impl Iterator<Item = (&str, &GraphiteConfig)> {
        let primary = self
            .graphite
            .is_configured()
            .then_some((PRIMARY_BACKEND, &self.graphite));

        primary.into_iter().chain(
            self.backends
                .iter()
                .map(|backend| (backend.name.as_str(), &backend.graphite)),
        )
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.read.delay, Duration::from_secs(3600));
        assert!(config.read.ignore_error);
        assert_eq!(config.write.timeout, Duration::from_secs(300));
        assert_eq!(config.backends().count(), 0);
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"

[read]
timeout = "30s"
delay = "5m"
ignore_error = false

[write]
timeout = "10s"

[graphite]
default_prefix = "test.prefix."
enable_tags = true
use_openmetrics_format = true

[graphite.read]
url = "http://graphite-web:8080"
max_point_delta = "5m"

[graphite.write]
carbon_address = "carbon:2003"
carbon_transport = "tcp"
carbon_reconnect_interval = "2m"
enable_paths_cache = true
paths_cache_ttl = "18m"
paths_cache_purge_interval = "42m"

[graphite.write.template_data]
site_mapping = { eu-par = "fr_eqx" }

[[graphite.write.rules]]
match = { owner = "team-X" }
match_re = { service = "^(foo1|foo2|baz)$" }
template = 'great.graphite.path.host.{{.labels.owner}}.{{.labels.service}}{{if ne .labels.env "prod"}}.{{.labels.env}}{{end}}'
continue = true

[[graphite.write.rules]]
match = { owner = "team-X", env = "prod" }
template = "bla.bla.{{.labels.owner | escape}}.great.path"
continue = true

[[graphite.write.rules]]
match = { owner = "team-Z" }
continue = false
"#;
        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.read.timeout, Duration::from_secs(30));
        assert!(!config.read.ignore_error);
        assert_eq!(config.write.timeout, Duration::from_secs(10));

        let graphite = &config.graphite;
        assert_eq!(graphite.default_prefix, "test.prefix.");
        assert!(graphite.enable_tags);
        assert!(graphite.use_openmetrics_format);
        assert_eq!(graphite.read.max_point_delta, Duration::from_secs(300));
        assert_eq!(graphite.write.carbon_reconnect_interval, Duration::from_secs(120));
        assert_eq!(graphite.write.rules.len(), 3);
        assert_eq!(graphite.write.rules[1].match_labels.len(), 2);

        let names: Vec<_> = config.backends().map(|(name, _)| name).collect();
        assert_eq!(names, vec![PRIMARY_BACKEND]);
    }

    #[test]
    fn test_secondary_backends() {
        let toml = r#"
[graphite.write]
carbon_address = "carbon:2003"

[[backends]]
name = "mirror"
default_prefix = "mirror."

[backends.write]
carbon_address = "carbon-mirror:2003"
carbon_transport = "udp"
"#;
        let config = Config::from_str(toml).unwrap();
        let backends: Vec<_> = config.backends().collect();
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[1].0, "mirror");
        assert_eq!(backends[1].1.default_prefix, "mirror.");
        assert_eq!(backends[1].1.write.carbon_transport, CarbonTransport::Udp);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = Config::from_str("[graphite\ncarbon_address = ");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[graphite.write]\ncarbon_address = \"localhost:2003\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.graphite.write.carbon_address, "localhost:2003");
    }

    #[test]
    fn test_from_missing_file() {
        let result = Config::from_file("/nonexistent/cinder.toml");
        assert!(matches!(result, Err(ConfigError::IoError { .. })));
    }
}
