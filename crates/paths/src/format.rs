//! Default path construction
//!
//! The metric name is escaped and placed after the prefix; the remaining
//! labels follow in name order, so the result never depends on how the
//! label set was built.
//!
//! ```text
//! Carbon             prefix.name.label1.value1.label2.value2
//! CarbonTags         prefix.name;label1=value1;label2=value2
//! CarbonOpenMetrics  prefix.name{label1="value1",label2="value2"}
//! ```

use crate::escape::{escape, escape_tagged};
use crate::labels::{LabelSet, METRIC_NAME_LABEL};
use cinder_config::GraphiteConfig;

/// Default path syntax
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// Labels encoded as dotted path nodes
    #[default]
    Carbon,
    /// Labels as `;name=value` tags
    CarbonTags,
    /// Labels as an OpenMetrics `{name="value"}` group
    CarbonOpenMetrics,
}

impl Format {
    /// Select the format from backend settings
    pub fn from_config(config: &GraphiteConfig) -> Self {
        match (config.enable_tags, config.use_openmetrics_format) {
            (false, _) => Self::Carbon,
            (true, false) => Self::CarbonTags,
            (true, true) => Self::CarbonOpenMetrics,
        }
    }

    /// Whether labels can be parsed back from a path of this format
    pub fn is_dotted(&self) -> bool {
        matches!(self, Self::Carbon)
    }
}

/// Build the default path for a label set
pub fn default_path(labels: &LabelSet, format: Format, prefix: &str) -> String {
    let name = labels.metric_name().unwrap_or("");
    let mut path = String::with_capacity(prefix.len() + name.len() + labels.len() * 16);
    path.push_str(prefix);
    path.push_str(&escape(name));

    let mut qualifying = labels
        .iter()
        .filter(|(label, _)| !label.is_empty() && *label != METRIC_NAME_LABEL)
        .peekable();

    match format {
        Format::Carbon => {
            for (label, value) in qualifying {
                path.push('.');
                path.push_str(label);
                path.push('.');
                path.push_str(&escape(value));
            }
        }
        Format::CarbonTags => {
            for (label, value) in qualifying {
                path.push(';');
                path.push_str(label);
                path.push('=');
                path.push_str(&escape_tagged(value));
            }
        }
        Format::CarbonOpenMetrics => {
            if qualifying.peek().is_some() {
                path.push('{');
                for (i, (label, value)) in qualifying.enumerate() {
                    if i > 0 {
                        path.push(',');
                    }
                    path.push_str(label);
                    path.push_str("=\"");
                    path.push_str(&escape(value));
                    path.push('"');
                }
                path.push('}');
            }
        }
    }

    path
}
