//! Graphite backend configuration
//!
//! One `GraphiteConfig` describes a Carbon write target and/or a Graphite-web
//! read target, plus the rules used to turn label sets into paths.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Graphite backend settings
///
/// # Example
///
/// ```toml
/// [graphite]
/// default_prefix = "prometheus."
/// enable_tags = false
///
/// [graphite.read]
/// url = "http://graphite-web:8080"
///
/// [graphite.write]
/// carbon_address = "carbon:2003"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphiteConfig {
    /// Prefix prepended to every default path
    /// Default: ""
    pub default_prefix: String,

    /// Write tagged paths and query with `seriesByTag`
    /// Default: false
    pub enable_tags: bool,

    /// With tags enabled, write `name{k="v"}` instead of `name;k=v`
    /// Default: false
    pub use_openmetrics_format: bool,

    /// Graphite-web read settings
    pub read: GraphiteReadConfig,

    /// Carbon write settings
    pub write: GraphiteWriteConfig,
}

impl GraphiteConfig {
    /// Whether this backend has anything to do
    pub fn is_configured(&self) -> bool {
        !self.write.carbon_address.is_empty() || !self.read.url.is_empty()
    }

    /// The prefix to use for one request
    ///
    /// A non-empty override from the caller wins over `default_prefix`.
    pub fn storage_prefix<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => &self.default_prefix,
        }
    }
}

/// Graphite-web read settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphiteReadConfig {
    /// Base URL of the Graphite-web server; empty disables reads
    pub url: String,

    /// Interval used to linearly interpolate intermediate points;
    /// zero disables interpolation
    #[serde(with = "humantime_serde")]
    pub max_point_delta: Duration,
}

/// Carbon transport kind
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CarbonTransport {
    /// Stream socket (default)
    #[default]
    Tcp,
    /// Datagram socket, payloads capped at 1024 bytes
    Udp,
}

impl CarbonTransport {
    /// Transport name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Compression applied to the Carbon stream
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    /// Plain text lines (default)
    #[default]
    Plain,
    /// LZ4 frame per buffer
    Lz4,
}

/// LZ4 frame block size
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Lz4BlockSize {
    /// 64 KiB blocks (default)
    #[default]
    Max64Kb,
    /// 256 KiB blocks
    Max256Kb,
    /// 1 MiB blocks
    Max1Mb,
    /// 4 MiB blocks
    Max4Mb,
}

impl Lz4BlockSize {
    /// Block size in bytes
    pub fn bytes(&self) -> usize {
        match self {
            Self::Max64Kb => 64 * 1024,
            Self::Max256Kb => 256 * 1024,
            Self::Max1Mb => 1024 * 1024,
            Self::Max4Mb => 4 * 1024 * 1024,
        }
    }
}

/// LZ4 frame preferences
///
/// # Example
///
/// ```toml
/// [graphite.write.lz4_preferences]
/// block_size = "max256kb"
/// block_independent = true
/// content_checksum = true
/// block_checksum = true
/// compression_level = 12
/// auto_flush = true
/// decompression_speed = true
/// ```
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Lz4Preferences {
    /// Maximum block size
    pub block_size: Lz4BlockSize,

    /// Compress each block independently instead of linking to the previous one
    pub block_independent: bool,

    /// Append a checksum of the whole content after the end mark
    pub content_checksum: bool,

    /// Append a checksum after every block
    pub block_checksum: bool,

    /// Compression level hint (0 = fast)
    pub compression_level: i32,

    /// Flush a block after every write instead of filling it
    pub auto_flush: bool,

    /// Favor decompression speed over ratio
    pub decompression_speed: bool,
}

/// One path-generation rule
///
/// # Example
///
/// ```toml
/// [[graphite.write.rules]]
/// match = { owner = "team-X" }
/// match_re = { service = "^(foo1|foo2|baz)$" }
/// template = "great.graphite.path.host.{{.labels.owner}}.{{.labels.service}}"
/// continue = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuleConfig {
    /// Labels that must equal the given values
    #[serde(rename = "match")]
    pub match_labels: BTreeMap<String, String>,

    /// Labels whose values must fully match the given patterns
    pub match_re: BTreeMap<String, String>,

    /// Path template; absent with `continue = false` suppresses the metric
    pub template: Option<String>,

    /// Keep evaluating later rules after this one matched
    #[serde(rename = "continue")]
    pub continue_matching: bool,
}

/// Carbon write settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphiteWriteConfig {
    /// host:port of the Carbon daemon; empty disables writes
    pub carbon_address: String,

    /// Transport protocol
    /// Default: tcp
    pub carbon_transport: CarbonTransport,

    /// How long one connection is reused before it is redialed
    /// Default: 1h
    #[serde(with = "humantime_serde")]
    pub carbon_reconnect_interval: Duration,

    /// Whether to keep TCP keep-alive probes on the Carbon connection
    /// Default: true
    pub tcp_keepalive: bool,

    /// Compression applied to each buffer
    /// Default: plain
    pub compress_type: CompressType,

    /// LZ4 frame preferences, used when `compress_type = "lz4"`
    pub lz4_preferences: Lz4Preferences,

    /// Cache resolved paths per label set
    /// Default: true
    pub enable_paths_cache: bool,

    /// Lifetime of one cached path list
    /// Default: 1h
    #[serde(with = "humantime_serde")]
    pub paths_cache_ttl: Duration,

    /// Interval between sweeps of expired cache entries
    /// Default: 2h
    #[serde(with = "humantime_serde")]
    pub paths_cache_purge_interval: Duration,

    /// Static data exposed to templates next to `labels`
    pub template_data: BTreeMap<String, serde_json::Value>,

    /// Ordered path rules
    pub rules: Vec<RuleConfig>,
}

impl Default for GraphiteWriteConfig {
    fn default() -> Self {
        Self {
            carbon_address: String::new(),
            carbon_transport: CarbonTransport::Tcp,
            carbon_reconnect_interval: Duration::from_secs(60 * 60),
            tcp_keepalive: true,
            compress_type: CompressType::Plain,
            lz4_preferences: Lz4Preferences::default(),
            enable_paths_cache: true,
            paths_cache_ttl: Duration::from_secs(60 * 60),
            paths_cache_purge_interval: Duration::from_secs(2 * 60 * 60),
            template_data: BTreeMap::new(),
            rules: Vec::new(),
        }
    }
}

/// A secondary backend, declared with `[[backends]]`
#[derive(Debug, Clone, Deserialize)]
pub struct NamedBackendConfig {
    /// Backend name, reported in write responses
    pub name: String,

    /// Backend settings
    #[serde(flatten)]
    pub graphite: GraphiteConfig,
}

#[cfg(test)]
#[path = "graphite_test.rs"]
mod tests;
