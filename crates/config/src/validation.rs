//! Configuration validation
//!
//! Validates config consistency:
//! - Backend names are unique
//! - Declared backends have at least one address
//! - Rule regexes compile
//! - Intervals that drive timers are non-zero

use crate::error::{ConfigError, Result};
use crate::graphite::{GraphiteConfig, RuleConfig};
use crate::{Config, PRIMARY_BACKEND};
use std::collections::HashSet;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let mut names = HashSet::new();
    if config.graphite.is_configured() {
        names.insert(PRIMARY_BACKEND);
    }
    validate_backend(PRIMARY_BACKEND, &config.graphite)?;

    for backend in &config.backends {
        if backend.name.is_empty() {
            return Err(ConfigError::missing_field("backend", "<unnamed>", "name"));
        }
        if !names.insert(backend.name.as_str()) {
            return Err(ConfigError::duplicate_backend(&backend.name));
        }
        if !backend.graphite.is_configured() {
            return Err(ConfigError::missing_field(
                "backend",
                &backend.name,
                "write.carbon_address or read.url",
            ));
        }
        validate_backend(&backend.name, &backend.graphite)?;
    }

    Ok(())
}

/// Validate one backend's write settings and rules
fn validate_backend(name: &str, graphite: &GraphiteConfig) -> Result<()> {
    let write = &graphite.write;

    if !write.carbon_address.is_empty() && write.carbon_reconnect_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "backend",
            name,
            "write.carbon_reconnect_interval",
            "must be greater than zero",
        ));
    }

    if write.enable_paths_cache {
        if write.paths_cache_ttl.is_zero() {
            return Err(ConfigError::invalid_value(
                "backend",
                name,
                "write.paths_cache_ttl",
                "must be greater than zero when the paths cache is enabled",
            ));
        }
        if write.paths_cache_purge_interval.is_zero() {
            return Err(ConfigError::invalid_value(
                "backend",
                name,
                "write.paths_cache_purge_interval",
                "must be greater than zero when the paths cache is enabled",
            ));
        }
    }

    for (index, rule) in write.rules.iter().enumerate() {
        validate_rule(&format!("{}.write.rules[{}]", name, index), rule)?;
    }

    Ok(())
}

/// Check that every `match_re` pattern compiles the way the rule engine
/// will compile it
fn validate_rule(name: &str, rule: &RuleConfig) -> Result<()> {
    for (label, pattern) in &rule.match_re {
        if let Err(e) = regex::Regex::new(&format!("^(?:{})$", pattern)) {
            return Err(ConfigError::invalid_value(
                "rule",
                name,
                "match_re",
                format!("label '{}': {}", label, e),
            ));
        }
    }

    if rule.template.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::invalid_value(
            "rule",
            name,
            "template",
            "must not be empty; omit it to suppress matching metrics",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_duplicate_backend_names() {
        let toml = r#"
[[backends]]
name = "a"
write = { carbon_address = "one:2003" }

[[backends]]
name = "a"
write = { carbon_address = "two:2003" }
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBackend { .. }));
    }

    #[test]
    fn test_backend_named_like_primary() {
        let toml = r#"
[graphite.write]
carbon_address = "one:2003"

[[backends]]
name = "graphite"
write = { carbon_address = "two:2003" }
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateBackend { .. }));
    }

    #[test]
    fn test_declared_backend_without_addresses() {
        let toml = r#"
[[backends]]
name = "empty"
default_prefix = "x."
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_invalid_rule_regex() {
        let toml = r#"
[graphite.write]
carbon_address = "carbon:2003"

[[graphite.write.rules]]
match_re = { service = "(unclosed" }
template = "x"
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("match_re"));
        assert!(err.to_string().contains("graphite.write.rules[0]"));
    }

    #[test]
    fn test_empty_template_rejected() {
        let toml = r#"
[[graphite.write.rules]]
match = { owner = "x" }
template = ""
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn test_zero_cache_ttl_rejected_only_when_enabled() {
        let enabled = r#"
[graphite.write]
carbon_address = "carbon:2003"
paths_cache_ttl = "0s"
"#;
        assert!(Config::from_str(enabled).is_err());

        let disabled = r#"
[graphite.write]
carbon_address = "carbon:2003"
enable_paths_cache = false
paths_cache_ttl = "0s"
"#;
        assert!(Config::from_str(disabled).is_ok());
    }

    #[test]
    fn test_zero_reconnect_interval_rejected() {
        let toml = r#"
[graphite.write]
carbon_address = "carbon:2003"
carbon_reconnect_interval = "0s"
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("carbon_reconnect_interval"));
    }
}
