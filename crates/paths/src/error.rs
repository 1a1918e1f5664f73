//! Path translation error types

use thiserror::Error;

/// Errors from compiling or executing a path template
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Template text could not be parsed
    #[error("template parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// Template calls a function that does not exist
    #[error("function \"{0}\" not defined")]
    UnknownFunction(String),

    /// Template failed while rendering against a context
    #[error("template render error: {0}")]
    Render(String),
}

impl TemplateError {
    /// Create a parse error
    #[inline]
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Create a render error
    #[inline]
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}

/// Errors from translating samples and paths
#[derive(Debug, Error)]
pub enum PathError {
    /// Sample value is NaN or infinite
    #[error("invalid sample value: {value}")]
    InvalidSampleValue { value: f64 },

    /// Rule template failed to render
    #[error("failed to render template of rule {rule}: {source}")]
    Render {
        rule: usize,
        #[source]
        source: TemplateError,
    },

    /// Rule template failed to compile
    #[error("invalid template in rule {rule}: {source}")]
    InvalidTemplate {
        rule: usize,
        #[source]
        source: TemplateError,
    },

    /// Rule regex failed to compile
    #[error("invalid regex for label '{label}' in rule {rule}: {source}")]
    InvalidRegex {
        rule: usize,
        label: String,
        #[source]
        source: regex::Error,
    },

    /// A path could not be parsed back into labels
    #[error("unable to parse labels from path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl PathError {
    /// Create an invalid path error
    #[inline]
    pub fn invalid_path(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }
}

/// Result type for path operations
pub type Result<T> = std::result::Result<T, PathError>;
