//! Transport error types

use crate::frame::FrameError;
use std::io::{self, ErrorKind};
use thiserror::Error;

/// Errors from sending buffers to Carbon
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not resolve or connect to the Carbon address
    #[error("failed to dial carbon at {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Socket write failed or timed out
    #[error("carbon connection error: {source}")]
    Connection {
        #[source]
        source: io::Error,
    },

    /// The peer closed or reset the connection
    #[error("broken pipe to carbon: {source}")]
    BrokenPipe {
        #[source]
        source: io::Error,
    },

    /// A datagram went out shorter than its payload
    #[error("short write: sent {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// Compressing the buffer failed
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The request was cancelled before anything was sent
    #[error("send cancelled")]
    Cancelled,

    /// A pipeline task panicked or was aborted
    #[error("pipeline task failed: {0}")]
    Task(String),
}

impl TransportError {
    /// Create a dial error
    #[inline]
    pub fn dial(address: impl Into<String>, source: io::Error) -> Self {
        Self::Dial {
            address: address.into(),
            source,
        }
    }

    /// Classify a socket write error
    ///
    /// Broken pipes and resets mean the peer is gone; everything else is a
    /// generic connection error.
    pub fn from_socket(source: io::Error) -> Self {
        match source.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                Self::BrokenPipe { source }
            }
            _ => Self::Connection { source },
        }
    }

    /// Create a write timeout error
    #[inline]
    pub fn timed_out() -> Self {
        Self::Connection {
            source: io::Error::new(ErrorKind::TimedOut, "carbon write timed out"),
        }
    }

    /// Whether the connection must be torn down after this error
    pub fn is_connection_fault(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::BrokenPipe { .. } | Self::ShortWrite { .. }
        )
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_error_classification() {
        let err = TransportError::from_socket(io::Error::from(ErrorKind::BrokenPipe));
        assert!(matches!(err, TransportError::BrokenPipe { .. }));

        let err = TransportError::from_socket(io::Error::from(ErrorKind::ConnectionReset));
        assert!(matches!(err, TransportError::BrokenPipe { .. }));

        let err = TransportError::from_socket(io::Error::from(ErrorKind::PermissionDenied));
        assert!(matches!(err, TransportError::Connection { .. }));
    }

    #[test]
    fn test_connection_fault() {
        assert!(TransportError::timed_out().is_connection_fault());
        assert!(
            TransportError::ShortWrite {
                written: 3,
                expected: 10
            }
            .is_connection_fault()
        );
        assert!(!TransportError::Cancelled.is_connection_fault());
        assert!(
            !TransportError::dial("x:1", io::Error::from(ErrorKind::ConnectionRefused))
                .is_connection_fault()
        );
    }

    #[test]
    fn test_display() {
        let err = TransportError::ShortWrite {
            written: 3,
            expected: 10,
        };
        assert_eq!(err.to_string(), "short write: sent 3 of 10 bytes");

        let err = TransportError::dial("carbon:2003", io::Error::other("no route"));
        assert!(err.to_string().contains("carbon:2003"));
    }
}
