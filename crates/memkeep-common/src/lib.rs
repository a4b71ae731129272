//! # memkeep-common
//!
//! Common types, errors, and configuration for memkeep.
//!
//! This crate provides the foundational pieces shared by every memkeep
//! component:
//!
//! - **Types**: the opaque [`BlockId`] that names an arena allocation
//! - **Errors**: the unified [`MemoryError`] taxonomy with stable [`ErrorCode`]s
//! - **Config**: the [`ManagerConfig`] accepted by the memory manager
//! - **Constants**: defaults and limits
//!
//! ## Example
//!
//! ```rust
//! use memkeep_common::{BlockId, ManagerConfig, MemoryError, MemoryResult};
//!
//! fn lookup(id: BlockId) -> MemoryResult<()> {
//!     Err(MemoryError::InvalidBlock { id })
//! }
//!
//! let config = ManagerConfig::new(1024);
//! assert!(config.validate().is_ok());
//! assert!(lookup(BlockId::new(7)).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use config::ManagerConfig;
pub use constants::*;
pub use error::{ErrorCode, MemoryError, MemoryResult};
pub use types::BlockId;
