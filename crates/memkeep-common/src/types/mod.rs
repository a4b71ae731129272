//! Type definitions for memkeep.

mod ids;

pub use ids::BlockId;
