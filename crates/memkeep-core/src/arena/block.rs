//! Block metadata.

use std::fmt;

use memkeep_common::BlockId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a block.
///
/// ```text
/// Allocated ──refcount→0──► Collectible ──collector──► Reclaimed ──compactor──► (removed)
///     ▲                         │
///     └────refcount→1───────────┘
/// ```
///
/// Only `Allocated` and `Collectible` blocks accept reads, writes and
/// refcount changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockState {
    /// Live with at least one reference.
    Allocated,
    /// Live with no references; the next collector cycle reclaims it.
    Collectible,
    /// Logically freed; waiting for compaction to drop the entry.
    Reclaimed,
}

impl BlockState {
    /// Returns true if reads, writes and refcount changes are allowed.
    #[inline]
    pub fn is_accessible(self) -> bool {
        !matches!(self, Self::Reclaimed)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allocated => "allocated",
            Self::Collectible => "collectible",
            Self::Reclaimed => "reclaimed",
        };
        f.write_str(name)
    }
}

/// A named region of the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block's id.
    pub(crate) id: BlockId,
    /// Start of the region within the arena.
    pub(crate) offset: usize,
    /// Length of the region in bytes.
    pub(crate) length: usize,
    /// Outstanding references.
    pub(crate) ref_count: u32,
    /// False once the collector has reclaimed the block.
    pub(crate) live: bool,
}

impl Block {
    /// Creates a freshly allocated block holding one reference.
    pub(crate) fn new(id: BlockId, offset: usize, length: usize) -> Self {
        Self {
            id,
            offset,
            length,
            ref_count: 1,
            live: true,
        }
    }

    /// Returns the block id.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the current offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the length in bytes.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns the reference count.
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// Returns true until the collector reclaims the block.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Returns true if the collector would reclaim this block now.
    #[inline]
    pub fn is_collectible(&self) -> bool {
        self.live && self.ref_count == 0
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> BlockState {
        match (self.live, self.ref_count) {
            (false, _) => BlockState::Reclaimed,
            (true, 0) => BlockState::Collectible,
            (true, _) => BlockState::Allocated,
        }
    }

    /// Returns the end offset (exclusive).
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Returns a copy of the metadata for reporting.
    pub fn info(&self) -> BlockInfo {
        BlockInfo {
            id: self.id,
            offset: self.offset,
            length: self.length,
            ref_count: self.ref_count,
            state: self.state(),
        }
    }
}

/// Point-in-time copy of a block's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// The block id.
    pub id: BlockId,
    /// Offset within the arena.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    /// Reference count.
    pub ref_count: u32,
    /// Lifecycle state.
    pub state: BlockState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_block_is_allocated() {
        let block = Block::new(BlockId::new(1), 10, 20);
        assert_eq!(block.ref_count(), 1);
        assert!(block.is_live());
        assert_eq!(block.state(), BlockState::Allocated);
        assert_eq!(block.end(), 30);
    }

    #[test]
    fn test_state_transitions() {
        let mut block = Block::new(BlockId::new(1), 0, 8);
        block.ref_count = 0;
        assert_eq!(block.state(), BlockState::Collectible);
        assert!(block.is_collectible());
        assert!(block.state().is_accessible());

        block.live = false;
        assert_eq!(block.state(), BlockState::Reclaimed);
        assert!(!block.is_collectible());
        assert!(!block.state().is_accessible());
    }

    #[test]
    fn test_block_info() {
        let block = Block::new(BlockId::new(3), 4, 5);
        let info = block.info();
        assert_eq!(info.id, BlockId::new(3));
        assert_eq!(info.offset, 4);
        assert_eq!(info.length, 5);
        assert_eq!(info.ref_count, 1);
        assert_eq!(info.state, BlockState::Allocated);
        assert_eq!(info.state.to_string(), "allocated");
    }
}
