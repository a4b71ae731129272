//! Memory manager error types.

use std::fmt;
use thiserror::Error;

use crate::types::BlockId;

/// Error codes for categorizing errors.
///
/// These codes travel over the wire to remote callers and are stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Invalid configuration.
    InvalidConfig = 0x0001,
    /// Malformed request from a remote caller.
    BadRequest = 0x0002,
    /// The response would not fit in a single wire frame.
    ResponseTooLarge = 0x0003,

    // I/O errors (0x0100 - 0x01FF)
    /// General I/O error.
    Io = 0x0100,

    // Arena errors (0x0200 - 0x02FF)
    /// Not enough space left before the frontier.
    OutOfMemory = 0x0200,
    /// Block id unknown or already reclaimed.
    InvalidBlock = 0x0201,
    /// Requested size exceeds the block length.
    SizeMismatch = 0x0202,
    /// The arena buffer could not be obtained.
    AllocationFailure = 0x0203,
    /// The block's reference count cannot grow any further.
    RefCountOverflow = 0x0204,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maps a numeric code back to an `ErrorCode`.
    ///
    /// Unrecognized values map to [`ErrorCode::Unknown`].
    #[must_use]
    pub const fn from_u16(code: u16) -> Self {
        match code {
            0x0001 => Self::InvalidConfig,
            0x0002 => Self::BadRequest,
            0x0003 => Self::ResponseTooLarge,
            0x0100 => Self::Io,
            0x0200 => Self::OutOfMemory,
            0x0201 => Self::InvalidBlock,
            0x0202 => Self::SizeMismatch,
            0x0203 => Self::AllocationFailure,
            0x0204 => Self::RefCountOverflow,
            _ => Self::Unknown,
        }
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x01 => "I/O",
            0x02 => "Arena",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// The main error type for memkeep.
///
/// # Example
///
/// ```rust
/// use memkeep_common::error::{ErrorCode, MemoryError, MemoryResult};
/// use memkeep_common::types::BlockId;
///
/// fn read_block(id: BlockId) -> MemoryResult<Vec<u8>> {
///     Err(MemoryError::InvalidBlock { id })
/// }
///
/// let err = read_block(BlockId::new(3)).unwrap_err();
/// assert_eq!(err.code(), ErrorCode::InvalidBlock);
/// ```
#[derive(Debug, Error)]
pub enum MemoryError {
    // ==========================================================================
    // Arena Errors
    // ==========================================================================
    /// The requested allocation does not fit before the end of the arena.
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Bytes requested.
        requested: usize,
        /// Bytes left between the frontier and the arena capacity.
        available: usize,
    },

    /// The block id is unknown, reclaimed, or removed by compaction.
    #[error("block {id} is not valid")]
    InvalidBlock {
        /// The offending id.
        id: BlockId,
    },

    /// A read or write asked for more bytes than the block holds.
    #[error("block {id} holds {block_size} bytes, {requested} requested")]
    SizeMismatch {
        /// The block being accessed.
        id: BlockId,
        /// Bytes requested by the caller.
        requested: usize,
        /// Length of the block.
        block_size: usize,
    },

    /// The block already holds the maximum number of references.
    #[error("block {id} reference count overflow")]
    RefCountOverflow {
        /// The offending id.
        id: BlockId,
    },

    /// The arena buffer itself could not be obtained.
    #[error("failed to allocate arena of {capacity} bytes: {reason}")]
    AllocationFailure {
        /// Capacity that was requested.
        capacity: usize,
        /// Why the allocation failed.
        reason: String,
    },

    // ==========================================================================
    // Configuration and I/O Errors
    // ==========================================================================
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl MemoryError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid block error.
    #[must_use]
    pub const fn invalid_block(id: BlockId) -> Self {
        Self::InvalidBlock { id }
    }

    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            Self::InvalidBlock { .. } => ErrorCode::InvalidBlock,
            Self::SizeMismatch { .. } => ErrorCode::SizeMismatch,
            Self::AllocationFailure { .. } => ErrorCode::AllocationFailure,
            Self::RefCountOverflow { .. } => ErrorCode::RefCountOverflow,
            Self::Config { .. } => ErrorCode::InvalidConfig,
            Self::Io { .. } => ErrorCode::Io,
        }
    }

    /// Returns true if the caller may retry, e.g. after compacting.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Returns true if the manager cannot be used after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AllocationFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::OutOfMemory.as_u16(), 0x0200);
        assert_eq!(ErrorCode::InvalidBlock.category(), "Arena");
        assert_eq!(ErrorCode::Io.category(), "I/O");
        assert_eq!(ErrorCode::InvalidConfig.category(), "General");
    }

    #[test]
    fn test_code_round_trip() {
        for code in [
            ErrorCode::InvalidConfig,
            ErrorCode::BadRequest,
            ErrorCode::ResponseTooLarge,
            ErrorCode::Io,
            ErrorCode::OutOfMemory,
            ErrorCode::InvalidBlock,
            ErrorCode::SizeMismatch,
            ErrorCode::AllocationFailure,
            ErrorCode::RefCountOverflow,
        ] {
            assert_eq!(ErrorCode::from_u16(code.as_u16()), code);
        }
        assert_eq!(ErrorCode::from_u16(0xFFFF), ErrorCode::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = MemoryError::SizeMismatch {
            id: BlockId::new(4),
            requested: 16,
            block_size: 8,
        };
        assert_eq!(err.to_string(), "block 4 holds 8 bytes, 16 requested");

        let err = MemoryError::OutOfMemory {
            requested: 100,
            available: 10,
        };
        assert!(err.to_string().contains("requested 100 bytes"));
    }

    #[test]
    fn test_error_classification() {
        let oom = MemoryError::OutOfMemory {
            requested: 1,
            available: 0,
        };
        assert!(oom.is_retryable());
        assert!(!oom.is_fatal());

        let invalid = MemoryError::invalid_block(BlockId::new(1));
        assert!(!invalid.is_retryable());
        assert_eq!(invalid.code(), ErrorCode::InvalidBlock);

        let fatal = MemoryError::AllocationFailure {
            capacity: 1,
            reason: "denied".into(),
        };
        assert!(fatal.is_fatal());
        assert_eq!(fatal.code(), ErrorCode::AllocationFailure);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: MemoryError = io.into();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
