//! The arena: byte buffer, block table and bump allocator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ArenaState                            │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     BlockTable                          │  │
//! │  │        HashMap<BlockId, {offset, length, rc, live}>     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                             │ offsets                        │
//! │                             ▼                                │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     ArenaBuffer                         │  │
//! │  │  [ block 1 | block 2 | (reclaimed) | block 4 |  free ]  │  │
//! │  │                                              ▲          │  │
//! │  │                                          frontier       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Allocation only ever bumps the frontier. Reclaimed blocks leave holes
//! that stay unusable until the compactor slides the live blocks down.

mod block;
mod buffer;
mod state;
mod table;

use serde::{Deserialize, Serialize};

pub use block::{Block, BlockInfo, BlockState};
pub use buffer::ArenaBuffer;
pub use state::ArenaState;
pub use table::BlockTable;

/// How the arena is being used at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaUsage {
    /// Total capacity in bytes.
    pub capacity: usize,
    /// Bytes below the frontier, including holes.
    pub used: usize,
    /// Bytes past the frontier.
    pub free: usize,
    /// Live blocks with at least one reference.
    pub live_blocks: usize,
    /// Live blocks with no references.
    pub collectible_blocks: usize,
    /// Reclaimed blocks still waiting for compaction.
    pub reclaimed_blocks: usize,
    /// Bytes held by live blocks (allocated or collectible).
    pub live_bytes: usize,
}

impl ArenaUsage {
    /// Bytes below the frontier that compaction would give back.
    pub fn fragmented_bytes(&self) -> usize {
        self.used - self.live_bytes
    }

    /// Returns the used fraction of the arena (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.used as f64 / self.capacity as f64
        }
    }
}
