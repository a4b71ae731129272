//! The compactor.
//!
//! Slides every live block down to the start of the arena, in ascending
//! offset order, then drops the entries of reclaimed blocks for good and
//! pulls the frontier back to the end of the last live block.
//!
//! Processing blocks in ascending offset order means each destination is at
//! or below its source, so a forward in-place move never overwrites bytes
//! that still have to be copied. Ids, lengths and reference counts are left
//! alone; only offsets change.

use tracing::{debug, info};

use crate::arena::ArenaState;

/// What one compaction pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Live blocks that changed offset.
    pub blocks_moved: usize,
    /// Bytes copied while moving them.
    pub bytes_moved: usize,
    /// Reclaimed entries dropped from the table.
    pub entries_removed: usize,
    /// Frontier before compaction.
    pub frontier_before: usize,
    /// Frontier after compaction.
    pub frontier_after: usize,
}

impl CompactionResult {
    /// Bytes handed back to the allocator.
    pub fn bytes_recovered(&self) -> usize {
        self.frontier_before - self.frontier_after
    }

    /// Returns true if anything changed.
    pub fn did_work(&self) -> bool {
        self.blocks_moved > 0 || self.entries_removed > 0 || self.bytes_recovered() > 0
    }
}

impl ArenaState {
    /// Compacts the arena in place.
    ///
    /// Every block that was live before the call is readable afterwards
    /// under the same id with identical content.
    pub fn compact(&mut self) -> CompactionResult {
        let mut result = CompactionResult {
            frontier_before: self.buffer.frontier(),
            ..CompactionResult::default()
        };

        let mut next_offset = 0;
        for id in self.table.live_ids_by_offset() {
            let Ok(block) = self.table.live_mut(id) else {
                continue;
            };
            let (offset, length) = (block.offset, block.length);
            if offset != next_offset {
                debug_assert!(next_offset < offset);
                block.offset = next_offset;
                self.buffer.move_within(offset, length, next_offset);
                result.blocks_moved += 1;
                result.bytes_moved += length;
                debug!(%id, from = offset, to = next_offset, length, "moved block");
            }
            next_offset += length;
        }

        result.entries_removed = self.table.purge_reclaimed();
        self.buffer.rewind(next_offset);
        result.frontier_after = next_offset;

        info!(
            moved = result.blocks_moved,
            removed = result.entries_removed,
            recovered = result.bytes_recovered(),
            "compaction finished"
        );
        result
    }
}
