//! The block table.
//!
//! Maps block ids to their metadata and hands out ids. Ids increase
//! monotonically and are never reused, even after compaction drops an
//! entry.

use std::collections::HashMap;

use memkeep_common::{BlockId, MemoryError, MemoryResult};

use super::block::Block;

/// Id → block mapping, the allocator's source of truth.
#[derive(Debug)]
pub struct BlockTable {
    /// All known blocks, live or reclaimed.
    blocks: HashMap<BlockId, Block>,
    /// Id handed to the next registered block.
    next_id: BlockId,
}

impl BlockTable {
    /// Creates an empty table. The first id handed out is [`BlockId::FIRST`].
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            next_id: BlockId::FIRST,
        }
    }

    /// Registers a new block and returns its id.
    pub(crate) fn register(&mut self, offset: usize, length: usize) -> BlockId {
        let id = self.next_id;
        self.next_id = id.next();
        self.blocks.insert(id, Block::new(id, offset, length));
        id
    }

    /// Returns the block if it is present, live or not.
    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Returns the block if it is present and live.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] otherwise.
    pub fn live(&self, id: BlockId) -> MemoryResult<&Block> {
        self.blocks
            .get(&id)
            .filter(|block| block.live)
            .ok_or(MemoryError::InvalidBlock { id })
    }

    /// Mutable variant of [`BlockTable::live`].
    pub(crate) fn live_mut(&mut self, id: BlockId) -> MemoryResult<&mut Block> {
        self.blocks
            .get_mut(&id)
            .filter(|block| block.live)
            .ok_or(MemoryError::InvalidBlock { id })
    }

    /// Iterates over every entry in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Mutable iteration over every entry.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Block> {
        self.blocks.values_mut()
    }

    /// Returns the ids of live blocks ordered by ascending offset.
    pub(crate) fn live_ids_by_offset(&self) -> Vec<BlockId> {
        let mut live: Vec<(usize, BlockId)> = self
            .blocks
            .values()
            .filter(|block| block.live)
            .map(|block| (block.offset, block.id))
            .collect();
        live.sort_unstable();
        live.into_iter().map(|(_, id)| id).collect()
    }

    /// Drops every reclaimed entry and returns how many were removed.
    pub(crate) fn purge_reclaimed(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|_, block| block.live);
        before - self.blocks.len()
    }

    /// Returns the number of entries, live or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the id the next registration will receive.
    #[inline]
    pub fn next_id(&self) -> BlockId {
        self.next_id
    }
}

impl Default for BlockTable {
    fn default() -> Self {
        Self::new()
    }
}
