//! Path templates
//!
//! A small Go-template-style language, compiled once and rendered many
//! times, concurrently, against a JSON context.
//!
//! # Syntax
//!
//! ```text
//! text {{ .labels.owner | escape }} more text
//! {{ if eq .labels.env "prod" }}prod{{ else if .labels.env }}{{ .labels.env }}{{ else }}none{{ end }}
//! {{ index (split .labels.instance ":") 0 }}
//! {{- trims whitespace on the left, and on the right -}}
//! ```
//!
//! Operands are `.` (the whole context), dotted lookups such as `.a.b`,
//! `"quoted"` and `` `raw` `` strings, integers, `true`/`false` and
//! parenthesized pipelines. In a pipeline the value on the left of `|` is
//! passed as the last argument of the function on the right.
//!
//! A lookup of a key that does not exist yields a missing value. Printing
//! it writes nothing; passing it to a string function fails the render.

mod exec;
mod funcs;
mod lexer;
mod parse;
mod value;

pub use value::Value;

use crate::error::TemplateError;
use parse::Node;
use std::fmt;
use std::str::FromStr;

/// A compiled template
#[derive(Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Compile template source
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::Parse` for malformed syntax and
    /// `TemplateError::UnknownFunction` for calls to undefined functions.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let nodes = parse::parse(&source)?;
        Ok(Self { source, nodes })
    }

    /// Source the template was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against a context
    pub fn render(&self, context: &serde_json::Value) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.source.len() + 32);
        exec::render(&self.nodes, context, &mut out)?;
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Template").field(&self.source).finish()
    }
}

#[cfg(test)]
#[path = "template_test.rs"]
mod tests;
