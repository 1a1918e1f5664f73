//! Runtime values of the template engine

use crate::error::TemplateError;
use serde_json::Map;
use std::fmt::{self, Write};

/// A value flowing through a template pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Lookup of a key that does not exist
    Missing,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Map<String, serde_json::Value>),
}

impl Value {
    /// Go-template truthiness: zero values are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Missing | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
        }
    }

    /// Type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing value",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Borrow the value as a string argument of `func`
    pub fn as_str_arg(&self, func: &str, position: usize) -> Result<&str, TemplateError> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(TemplateError::render(format!(
                "{}: argument {} must be a string, got {}",
                func,
                position + 1,
                other.kind()
            ))),
        }
    }

    /// Append the printed form to `out`
    pub fn print_to(&self, out: &mut String) {
        match self {
            Self::Missing | Self::Null => {}
            Self::Str(s) => out.push_str(s),
            other => {
                let _ = write!(out, "{}", other);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing | Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Self::Map(map) => match serde_json::to_string(map) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Map(map.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
