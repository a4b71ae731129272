//! Configuration for memkeep.
//!
//! Parsing configuration files is the job of the embedding process; this
//! module only defines the values the memory manager accepts at
//! construction time.

mod manager;

pub use manager::ManagerConfig;
