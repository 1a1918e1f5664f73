//! Cinder Paths - Label set to Graphite path translation
//!
//! This crate turns Prometheus-style label sets into Graphite paths and back:
//! - `escape` - General and tag-value escaping
//! - `Template` - Compiled path templates
//! - `RuleSet` - Ordered rules that select templates
//! - `default_path` - Fallback path in dotted, tagged or OpenMetrics form
//! - `PathCache` / `PathResolver` - Memoized resolution per configuration
//! - `to_datapoints` - Carbon plaintext lines for one sample
//! - `labels_from_path` / `labels_from_tags` - The reverse direction for reads
//!
//! # Example
//!
//! ```
//! use cinder_paths::{Format, LabelSet, PathResolver, RuleSet, METRIC_NAME_LABEL};
//!
//! let resolver = PathResolver::new(RuleSet::default(), Format::Carbon, "prom.");
//! let labels = LabelSet::new()
//!     .with(METRIC_NAME_LABEL, "up")
//!     .with("job", "node");
//! let paths = resolver.resolve(&labels, None).unwrap();
//! assert_eq!(&*paths, &["prom.up.job.node".to_string()]);
//! ```

pub mod cache;
pub mod datapoints;
pub mod error;
pub mod escape;
pub mod format;
pub mod labels;
pub mod resolver;
pub mod reverse;
pub mod rules;
pub mod template;

pub use cache::{CacheStats, PathCache};
pub use datapoints::{to_datapoints, write_line};
pub use error::{PathError, Result, TemplateError};
pub use escape::{escape, escape_tagged, unescape};
pub use format::{Format, default_path};
pub use labels::{LabelSet, METRIC_NAME_LABEL, Sample};
pub use resolver::PathResolver;
pub use reverse::{GRAPHITE_NAME_TAG, labels_from_path, labels_from_tags};
pub use rules::{Rule, RuleOutcome, RuleSet};
pub use template::Template;
