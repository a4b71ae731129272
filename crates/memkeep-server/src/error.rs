//! Wire and connection errors.

use memkeep_common::ErrorCode;
use thiserror::Error;

/// Errors raised while talking to a memkeep peer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message could not be encoded.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// A frame or payload could not be decoded.
    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    /// A frame exceeded the maximum payload size.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced or actual payload size.
        size: usize,
        /// Maximum accepted payload size.
        max: usize,
    },

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// The server answered with an error.
    #[error("remote error {code:?}: {message}")]
    Remote {
        /// Error classification.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },

    /// The server answered with a response of the wrong kind.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns the error code carried by a remote error.
    pub fn remote_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
