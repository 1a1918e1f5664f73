//! Query error types

/// Errors that can occur while answering a remote-read query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query cannot be expressed against Graphite
    #[error("invalid remote query: {0}")]
    InvalidQuery(String),

    /// The HTTP request did not complete
    #[error("request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    /// Graphite-web answered with a non-success status
    #[error("graphite-web returned {status} for {url}")]
    Status { url: String, status: u16 },

    /// The response body was not the expected JSON
    #[error("failed to decode graphite-web response: {0}")]
    Decode(String),

    /// A series path could not be turned back into labels
    #[error(transparent)]
    Path(#[from] cinder_paths::PathError),

    /// The read did not finish in time
    #[error("read timed out")]
    Timeout,
}

impl QueryError {
    /// Create an invalid query error
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    /// Whether the caller sent a query that can never succeed
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(err: serde_json::Error) -> Self {
        QueryError::Decode(err.to_string())
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_fault() {
        assert!(QueryError::invalid("no __name__ label provided").is_client_fault());
        assert!(!QueryError::Timeout.is_client_fault());
        assert!(
            !QueryError::Status {
                url: "http://g/render".into(),
                status: 500
            }
            .is_client_fault()
        );
    }

    #[test]
    fn test_invalid_query_message() {
        let err = QueryError::invalid("no __name__ label provided");
        assert_eq!(
            err.to_string(),
            "invalid remote query: no __name__ label provided"
        );
    }
}
