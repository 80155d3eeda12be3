//! Error types for the vector index client.

use thiserror::Error;

/// Errors raised by index transports and the [`VectorIndex`] facade.
///
/// [`VectorIndex`]: crate::client::VectorIndex
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector did not match the collection's configured width.
    /// Rejected locally; never sent to the service.
    #[error("invalid vector length: expected {expected}, got {actual}")]
    InvalidVector { expected: usize, actual: usize },

    /// The connection could not be established or was reset mid-call.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// The service answered with a server-side failure status.
    #[error("index service unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// A response body could not be parsed.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },

    /// The service rejected the request (client-side error status).
    #[error("index API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// All retry attempts for an operation were exhausted.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// Returns `true` when the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Unavailable { .. } | Self::MalformedResponse { .. }
        )
    }

    /// Returns `true` when the connection handle itself should be
    /// discarded and recreated before the next attempt.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedResponse {
                message: err.to_string(),
            }
        } else {
            // Connect failures, timeouts, and mid-body resets all force
            // handle recreation.
            Self::Connection {
                message: err.to_string(),
            }
        }
    }
}

/// Convenience alias for index client results.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
