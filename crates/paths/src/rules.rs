//! Rule matching and template rendering
//!
//! Rules are evaluated in configured order. The first rule that matches and
//! has neither a template nor `continue` suppresses the metric. Every other
//! matching rule renders its template; a rule without `continue` stops the
//! walk. When no terminal rule matched, the caller appends the default path.

use crate::error::{PathError, Result};
use crate::labels::LabelSet;
use crate::template::Template;
use cinder_config::RuleConfig;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which labels are exposed to templates
pub const LABELS_KEY: &str = "labels";

/// One compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    match_labels: BTreeMap<String, String>,
    match_re: Vec<(String, Regex)>,
    template: Option<Arc<Template>>,
    continue_matching: bool,
}

impl Rule {
    /// Compile a rule; `index` is used in error messages
    pub fn compile(index: usize, config: &RuleConfig) -> Result<Self> {
        let match_re = config
            .match_re
            .iter()
            .map(|(label, pattern)| {
                Regex::new(&format!("^(?:{})$", pattern))
                    .map(|re| (label.clone(), re))
                    .map_err(|source| PathError::InvalidRegex {
                        rule: index,
                        label: label.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let template = config
            .template
            .as_deref()
            .map(|source| {
                Template::parse(source)
                    .map(Arc::new)
                    .map_err(|source| PathError::InvalidTemplate { rule: index, source })
            })
            .transpose()?;

        Ok(Self {
            match_labels: config.match_labels.clone(),
            match_re,
            template,
            continue_matching: config.continue_matching,
        })
    }

    /// Whether every constraint holds; absent labels compare as ""
    pub fn matches(&self, labels: &LabelSet) -> bool {
        self.match_labels
            .iter()
            .all(|(name, want)| labels.get(name).unwrap_or("") == want)
            && self
                .match_re
                .iter()
                .all(|(name, re)| re.is_match(labels.get(name).unwrap_or("")))
    }

    /// Whether a match suppresses the metric
    #[inline]
    pub fn suppresses(&self) -> bool {
        self.template.is_none() && !self.continue_matching
    }
}

/// Result of walking the rules for one label set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Rendered paths in rule order
    pub paths: Vec<String>,

    /// A rule without `continue` matched; no default path is added
    pub terminal: bool,
}

/// Ordered rules plus the static data exposed to their templates
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    template_data: Map<String, Value>,
}

impl RuleSet {
    /// Compile rules and template data
    ///
    /// # Errors
    ///
    /// Returns the first regex or template that fails to compile.
    pub fn compile(rules: &[RuleConfig], template_data: &BTreeMap<String, Value>) -> Result<Self> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::compile(index, rule))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            template_data: template_data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Walk the rules for one label set
    ///
    /// # Errors
    ///
    /// Returns `PathError::Render` for the first template that fails; no
    /// partial output is returned.
    pub fn evaluate(&self, labels: &LabelSet) -> Result<RuleOutcome> {
        let mut outcome = RuleOutcome::default();
        let mut context = None;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(labels) {
                continue;
            }

            if rule.suppresses() {
                return Ok(RuleOutcome {
                    paths: Vec::new(),
                    terminal: true,
                });
            }

            if let Some(template) = &rule.template {
                let context = context.get_or_insert_with(|| self.context(labels));
                let path = template
                    .render(context)
                    .map_err(|source| PathError::Render { rule: index, source })?;
                outcome.paths.push(path);
            }

            if !rule.continue_matching {
                outcome.terminal = true;
                return Ok(outcome);
            }
        }

        Ok(outcome)
    }

    /// Template data with the labels merged in under `labels`
    fn context(&self, labels: &LabelSet) -> Value {
        let mut context = self.template_data.clone();
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        context.insert(LABELS_KEY.to_string(), Value::Object(labels));
        Value::Object(context)
    }
}

#[cfg(test)]
#[path = "rules_test.rs"]
mod tests;
