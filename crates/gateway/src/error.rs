//! Gateway error types

use cinder_carbon::TransportError;
use cinder_config::ConfigError;
use cinder_paths::PathError;
use cinder_query::QueryError;
use thiserror::Error;

/// Errors surfaced by the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Rules or templates could not be compiled
    #[error(transparent)]
    Path(#[from] PathError),

    /// Sending to Carbon failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading from Graphite-web failed
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The backend has no read URL
    #[error("backend '{0}' has no read url")]
    NotReadable(String),

    /// Reads need exactly one backend with a read URL
    #[error("expected exactly one reader, found {0} readers")]
    ReaderCount(usize),

    /// The read did not finish within the read timeout
    #[error("read from '{backend}' timed out")]
    ReadTimeout { backend: String },

    /// Sample input could not be parsed
    #[error("invalid sample input: {0}")]
    InvalidInput(String),
}

impl GatewayError {
    /// Whether the caller is at fault, as opposed to a backend
    pub fn is_client_fault(&self) -> bool {
        match self {
            Self::Query(e) => e.is_client_fault(),
            Self::InvalidInput(_) => true,
            _ => false,
        }
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
