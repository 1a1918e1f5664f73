//! Command implementations for the Cinder CLI

pub mod check;
pub mod read;
pub mod write;

use std::path::Path;

use anyhow::{Context, Result};
use cinder_config::Config;

/// Config file used when `--config` is not given
const DEFAULT_CONFIG: &str = "cinder.toml";

/// Load the configuration
///
/// An explicit path must exist. Without one, `cinder.toml` in the working
/// directory is used if present, otherwise every default.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(DEFAULT_CONFIG)
            .with_context(|| format!("failed to load config {DEFAULT_CONFIG}")),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[graphite.write]\ncarbon_address = \"carbon:2003\"").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.graphite.write.carbon_address, "carbon:2003");
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
