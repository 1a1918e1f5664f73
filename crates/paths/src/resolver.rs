//! Path resolution: rules, default path and cache
//!
//! `PathResolver` is built from one backend configuration. It owns the
//! compiled rules, the output format, the default prefix and (optionally)
//! the path cache, so cached entries can never outlive the configuration
//! that produced them.

use crate::cache::PathCache;
use crate::error::Result;
use crate::format::{Format, default_path};
use crate::labels::LabelSet;
use crate::rules::RuleSet;
use cinder_config::GraphiteConfig;
use std::sync::Arc;

/// Resolves label sets to Graphite paths
#[derive(Debug, Clone)]
pub struct PathResolver {
    rules: RuleSet,
    format: Format,
    prefix: String,
    cache: Option<Arc<PathCache>>,
}

impl PathResolver {
    /// Create a resolver without a cache
    pub fn new(rules: RuleSet, format: Format, prefix: impl Into<String>) -> Self {
        Self {
            rules,
            format,
            prefix: prefix.into(),
            cache: None,
        }
    }

    /// Attach a path cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<PathCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a resolver from backend settings
    ///
    /// A cache is attached when `enable_paths_cache` is set; its sweeper is
    /// not started here.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule regex or template fails to compile.
    pub fn from_config(config: &GraphiteConfig) -> Result<Self> {
        let write = &config.write;
        let rules = RuleSet::compile(&write.rules, &write.template_data)?;
        let resolver = Self::new(rules, Format::from_config(config), &config.default_prefix);

        if write.enable_paths_cache {
            let cache = PathCache::new(write.paths_cache_ttl, write.paths_cache_purge_interval);
            Ok(resolver.with_cache(Arc::new(cache)))
        } else {
            Ok(resolver)
        }
    }

    /// Compiled rules
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Output format
    pub fn format(&self) -> Format {
        self.format
    }

    /// Default prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The attached cache, if any
    pub fn cache(&self) -> Option<&Arc<PathCache>> {
        self.cache.as_ref()
    }

    /// Resolve the paths for a label set
    ///
    /// A non-empty `prefix_override` that differs from the default prefix
    /// is resolved without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns `PathError::Render` if a matching rule's template fails.
    /// Failures are never cached.
    pub fn resolve(&self, labels: &LabelSet, prefix_override: Option<&str>) -> Result<Arc<[String]>> {
        let prefix = match prefix_override {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => self.prefix.as_str(),
        };

        let cache = self.cache.as_ref().filter(|_| prefix == self.prefix);
        let Some(cache) = cache else {
            return self.compute(labels, prefix).map(Arc::from);
        };

        let fingerprint = labels.fingerprint();
        if let Some(paths) = cache.get(fingerprint) {
            return Ok(paths);
        }

        let paths: Arc<[String]> = self.compute(labels, prefix)?.into();
        cache.insert(fingerprint, Arc::clone(&paths));
        Ok(paths)
    }

    /// Rule paths, plus the default path when no terminal rule matched
    fn compute(&self, labels: &LabelSet, prefix: &str) -> Result<Vec<String>> {
        let mut outcome = self.rules.evaluate(labels)?;
        if !outcome.terminal {
            outcome.paths.push(default_path(labels, self.format, prefix));
        }
        Ok(outcome.paths)
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
