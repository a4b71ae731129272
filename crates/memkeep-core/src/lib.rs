//! # memkeep-core
//!
//! A fixed-capacity memory manager with reference counting, background
//! garbage collection and explicit compaction.
//!
//! ## Components
//!
//! - **Arena**: one contiguous byte buffer, a block table and a bump
//!   allocator ([`arena`])
//! - **Handles**: typed, reference-counted block references ([`Handle`])
//! - **Collector**: a background thread that reclaims unreferenced blocks
//! - **Compactor**: slides live blocks together on request
//!   ([`MemoryManager::defragment`])
//! - **Snapshots**: text dumps of the block table ([`snapshot`])
//!
//! Everything is guarded by a single mutex owned by [`MemoryManager`].
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use memkeep_common::ManagerConfig;
//! use memkeep_core::{Handle, MemoryManager};
//!
//! let config = ManagerConfig::new(1024).with_collector_interval(Duration::from_millis(50));
//! let manager = MemoryManager::new(config).unwrap();
//!
//! let counter = Handle::with_value(&manager, 1u64).unwrap();
//! counter.set(&(counter.get().unwrap() + 1)).unwrap();
//! assert_eq!(counter.get().unwrap(), 2);
//!
//! drop(counter);
//! manager.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;
pub mod collector;
pub mod compactor;
pub mod handle;
pub mod manager;
pub mod snapshot;
pub mod stats;
pub mod value;

pub use arena::{ArenaUsage, BlockInfo, BlockState};
pub use collector::SweepResult;
pub use compactor::CompactionResult;
pub use handle::Handle;
pub use manager::MemoryManager;
pub use snapshot::{ArenaSnapshot, SnapshotWriter};
pub use stats::{ManagerStats, StatsSnapshot};
pub use value::BlockValue;
