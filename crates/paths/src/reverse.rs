//! Reading labels back from Graphite
//!
//! Dotted paths are parsed by inverting the `Carbon` default path format.
//! Tagged series carry their labels explicitly, with the metric name under
//! the `name` tag.

use crate::error::{PathError, Result};
use crate::escape::unescape;
use crate::labels::{LabelSet, METRIC_NAME_LABEL};

/// Graphite's tag holding the series name
pub const GRAPHITE_NAME_TAG: &str = "name";

/// Parse `prefix.name.label1.value1.label2.value2` back into labels
///
/// # Errors
///
/// Returns `PathError::InvalidPath` when the path is empty after the prefix
/// or the label nodes do not come in name/value pairs.
pub fn labels_from_path(path: &str, prefix: &str) -> Result<LabelSet> {
    let cleaned = path.strip_prefix(prefix).unwrap_or(path).trim_matches('.');
    if cleaned.is_empty() {
        return Err(PathError::invalid_path(path, "no metric name in path"));
    }

    let mut nodes = cleaned.split('.');
    let mut labels = LabelSet::new();
    if let Some(name) = nodes.next() {
        labels.insert(METRIC_NAME_LABEL, unescape(name));
    }

    let rest: Vec<&str> = nodes.collect();
    if rest.len() % 2 != 0 {
        return Err(PathError::invalid_path(path, "odd number of nodes in path"));
    }
    for pair in rest.chunks_exact(2) {
        labels.insert(pair[0], unescape(pair[1]));
    }

    Ok(labels)
}

/// Build labels from a tagged series' tags
///
/// The `name` tag becomes the metric name with the storage prefix removed.
pub fn labels_from_tags<'a, I>(tags: I, prefix: &str) -> LabelSet
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(name, value)| {
            if name == GRAPHITE_NAME_TAG {
                (
                    METRIC_NAME_LABEL.to_string(),
                    value.strip_prefix(prefix).unwrap_or(value).to_string(),
                )
            } else {
                (name.to_string(), value.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Format, default_path};

    #[test]
    fn test_labels_from_path() {
        let labels = labels_from_path(
            "prometheus-prefix.test.owner.team-Y.interface.Hu0%2F0%2F1%2F3%2E99",
            "prometheus-prefix",
        )
        .unwrap();
        let expected = LabelSet::new()
            .with(METRIC_NAME_LABEL, "test")
            .with("owner", "team-Y")
            .with("interface", "Hu0/0/1/3.99");
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_labels_from_path_name_only() {
        let labels = labels_from_path("prefix.test", "prefix.").unwrap();
        assert_eq!(labels, LabelSet::new().with(METRIC_NAME_LABEL, "test"));
    }

    #[test]
    fn test_labels_from_path_odd_nodes() {
        let err = labels_from_path("prefix.test.owner", "prefix.").unwrap_err();
        assert!(matches!(err, PathError::InvalidPath { .. }));
    }

    #[test]
    fn test_labels_from_path_empty() {
        assert!(labels_from_path("prefix.", "prefix.").is_err());
    }

    #[test]
    fn test_inverts_dotted_default_path() {
        let labels = LabelSet::new()
            .with(METRIC_NAME_LABEL, "node.load")
            .with("instance", "10.0.0.1:9100")
            .with("path", "/var/lib (x)");
        let path = default_path(&labels, Format::Carbon, "prom.");
        assert_eq!(labels_from_path(&path, "prom.").unwrap(), labels);
    }

    #[test]
    fn test_labels_from_tags() {
        let tags = [
            ("name", "prometheus-prefix.test"),
            ("owner", "team-X"),
            ("foo", "bar"),
        ];
        let labels = labels_from_tags(tags, "prometheus-prefix.");
        let expected = LabelSet::new()
            .with(METRIC_NAME_LABEL, "test")
            .with("foo", "bar")
            .with("owner", "team-X");
        assert_eq!(labels, expected);
    }
}
