//! Remote-read request and response types
//!
//! These mirror the Prometheus remote-read messages: a request carries one
//! or more queries, each a time window plus label matchers, and the response
//! carries one result per query.

use cinder_paths::LabelSet;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// How a matcher compares a label value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// `name="value"`
    Equal,
    /// `name!="value"`
    NotEqual,
    /// `name=~"pattern"`
    Regex,
    /// `name!~"pattern"`
    NotRegex,
}

impl MatchType {
    /// PromQL operator
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
        }
    }
}

/// One label matcher of a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatcher {
    #[serde(rename = "type")]
    pub kind: MatchType,
    pub name: String,
    pub value: String,
}

impl LabelMatcher {
    /// Create a matcher
    pub fn new(kind: MatchType, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            value: value.into(),
        }
    }

    /// Shorthand for an `Equal` matcher
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(MatchType::Equal, name, value)
    }

    /// Parse `name=value`, `name!=value`, `name=~re` or `name!~re`
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidQuery` when no operator is present or the
    /// label name is empty.
    pub fn parse(s: &str) -> Result<Self> {
        // Longest operators first so `!=` is not read as `=`
        let found = ["!~", "=~", "!="]
            .iter()
            .filter_map(|op| s.find(op).map(|at| (at, *op)))
            .chain(s.find('=').map(|at| (at, "=")))
            .min_by_key(|(at, op)| (*at, std::cmp::Reverse(op.len())));

        let Some((at, op)) = found else {
            return Err(QueryError::invalid(format!("matcher {s:?} has no operator")));
        };

        let name = s[..at].trim();
        if name.is_empty() {
            return Err(QueryError::invalid(format!("matcher {s:?} has no label name")));
        }
        let value = s[at + op.len()..].trim().trim_matches('"');

        let kind = match op {
            "!~" => MatchType::NotRegex,
            "=~" => MatchType::Regex,
            "!=" => MatchType::NotEqual,
            _ => MatchType::Equal,
        };
        Ok(Self::new(kind, name, value))
    }

    /// Compile into a matcher that can test label sets
    ///
    /// Regex matchers are anchored at both ends, as in PromQL.
    pub fn compile(&self) -> Result<CompiledMatcher> {
        let regex = match self.kind {
            MatchType::Regex | MatchType::NotRegex => {
                let anchored = format!("^(?:{})$", self.value);
                Some(Regex::new(&anchored).map_err(|e| {
                    QueryError::invalid(format!("bad pattern for label {}: {e}", self.name))
                })?)
            }
            MatchType::Equal | MatchType::NotEqual => None,
        };
        Ok(CompiledMatcher {
            matcher: self.clone(),
            regex,
        })
    }
}

impl std::fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.kind.operator(), self.value)
    }
}

/// A matcher with its pattern compiled
#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    matcher: LabelMatcher,
    regex: Option<Regex>,
}

impl CompiledMatcher {
    /// Test a label set; an absent label matches as the empty string
    pub fn matches(&self, labels: &LabelSet) -> bool {
        let value = labels.get(&self.matcher.name).unwrap_or("");
        match (self.matcher.kind, &self.regex) {
            (MatchType::Equal, _) => value == self.matcher.value,
            (MatchType::NotEqual, _) => value != self.matcher.value,
            (MatchType::Regex, Some(re)) => re.is_match(value),
            (MatchType::NotRegex, Some(re)) => !re.is_match(value),
            (MatchType::Regex | MatchType::NotRegex, None) => false,
        }
    }
}

/// One remote-read query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Window start in milliseconds
    pub start_timestamp_ms: i64,
    /// Window end in milliseconds
    pub end_timestamp_ms: i64,
    pub matchers: Vec<LabelMatcher>,
}

impl Query {
    /// Create a query over `[start_ms, end_ms]`
    pub fn new(start_ms: i64, end_ms: i64, matchers: Vec<LabelMatcher>) -> Self {
        Self {
            start_timestamp_ms: start_ms,
            end_timestamp_ms: end_ms,
            matchers,
        }
    }

    /// The matcher on a given label, if any
    pub fn matcher(&self, name: &str) -> Option<&LabelMatcher> {
        self.matchers.iter().find(|m| m.name == name)
    }
}

/// A remote-read request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub queries: Vec<Query>,
}

/// One value at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub value: f64,
    pub timestamp_ms: i64,
}

impl Point {
    pub fn new(value: f64, timestamp_ms: i64) -> Self {
        Self {
            value,
            timestamp_ms,
        }
    }
}

/// Samples of one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub labels: LabelSet,
    pub samples: Vec<Point>,
}

/// Series answering one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub timeseries: Vec<TimeSeries>,
}

/// A remote-read response, one result per query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub results: Vec<QueryResult>,
}

impl ReadResponse {
    /// A response with one empty result
    pub fn empty() -> Self {
        Self {
            results: vec![QueryResult::default()],
        }
    }

    /// Total samples across every series
    pub fn sample_count(&self) -> usize {
        self.results
            .iter()
            .flat_map(|r| &r.timeseries)
            .map(|ts| ts.samples.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_paths::METRIC_NAME_LABEL;

    fn labels() -> LabelSet {
        LabelSet::new()
            .with(METRIC_NAME_LABEL, "test")
            .with("owner", "team-X")
    }

    #[test]
    fn test_parse_matchers() {
        assert_eq!(
            LabelMatcher::parse("__name__=test").unwrap(),
            LabelMatcher::equal("__name__", "test")
        );
        assert_eq!(
            LabelMatcher::parse("owner=~team.*").unwrap(),
            LabelMatcher::new(MatchType::Regex, "owner", "team.*")
        );
        assert_eq!(
            LabelMatcher::parse("owner!=\"x\"").unwrap(),
            LabelMatcher::new(MatchType::NotEqual, "owner", "x")
        );
        assert_eq!(
            LabelMatcher::parse("owner!~a=b").unwrap(),
            LabelMatcher::new(MatchType::NotRegex, "owner", "a=b")
        );
    }

    #[test]
    fn test_parse_matcher_errors() {
        assert!(LabelMatcher::parse("owner").unwrap_err().is_client_fault());
        assert!(LabelMatcher::parse("=x").is_err());
    }

    #[test]
    fn test_matchers() {
        let labels = labels();
        let check = |m: LabelMatcher| m.compile().unwrap().matches(&labels);

        assert!(check(LabelMatcher::equal("owner", "team-X")));
        assert!(!check(LabelMatcher::equal("owner", "team")));
        assert!(check(LabelMatcher::new(MatchType::NotEqual, "owner", "team-Y")));
        assert!(check(LabelMatcher::new(MatchType::Regex, "owner", "team.*")));
        // Anchored: a partial match is not enough
        assert!(!check(LabelMatcher::new(MatchType::Regex, "owner", "team")));
        assert!(check(LabelMatcher::new(MatchType::NotRegex, "owner", "other.*")));
    }

    #[test]
    fn test_absent_label_matches_as_empty() {
        let labels = labels();
        let check = |m: LabelMatcher| m.compile().unwrap().matches(&labels);

        assert!(check(LabelMatcher::new(MatchType::NotEqual, "invalid.", "fake")));
        assert!(check(LabelMatcher::equal("missing", "")));
        assert!(check(LabelMatcher::new(MatchType::Regex, "missing", ".*")));
        assert!(!check(LabelMatcher::new(MatchType::Regex, "missing", ".+")));
    }

    #[test]
    fn test_bad_pattern() {
        let err = LabelMatcher::new(MatchType::Regex, "owner", "(")
            .compile()
            .unwrap_err();
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_read_response_counts() {
        let response = ReadResponse {
            results: vec![QueryResult {
                timeseries: vec![TimeSeries {
                    labels: labels(),
                    samples: vec![Point::new(1.0, 0), Point::new(2.0, 1000)],
                }],
            }],
        };
        assert_eq!(response.sample_count(), 2);
        assert_eq!(ReadResponse::empty().results.len(), 1);
        assert_eq!(ReadResponse::empty().sample_count(), 0);
    }
}
