//! Error handling for memkeep.
//!
//! This module provides the error type and result alias shared by the
//! arena core, the service facade and the daemon.

mod memory;

pub use memory::{ErrorCode, MemoryError};

/// Result type alias for memkeep operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
