//! Arena state: buffer plus block table.
//!
//! [`ArenaState`] is the unsynchronized engine behind the memory manager.
//! Every method completes its whole effect or none of it, so wrapping the
//! state in a single mutex is enough to make each call one atomic critical
//! section. Offsets are resolved from the table on every call and never
//! handed out, because compaction may move any block between two calls.

use memkeep_common::{BlockId, MemoryError, MemoryResult};
use tracing::{debug, trace, warn};

use super::block::{Block, BlockInfo, BlockState};
use super::buffer::ArenaBuffer;
use super::table::BlockTable;
use super::ArenaUsage;

/// The arena bytes and the table describing them.
///
/// # Thread Safety
///
/// Not thread-safe. [`crate::MemoryManager`] guards it with one mutex.
///
/// # Example
///
/// ```rust
/// use memkeep_core::arena::ArenaState;
///
/// let mut state = ArenaState::with_capacity(1024).unwrap();
/// let id = state.allocate(5).unwrap();
/// state.write(id, b"Hola\0").unwrap();
/// assert_eq!(state.read(id, 5).unwrap(), b"Hola\0");
/// ```
#[derive(Debug)]
pub struct ArenaState {
    pub(crate) buffer: ArenaBuffer,
    pub(crate) table: BlockTable,
}

impl ArenaState {
    /// Creates an empty arena of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::AllocationFailure`] if the buffer cannot be
    /// obtained.
    pub fn with_capacity(capacity: usize) -> MemoryResult<Self> {
        Ok(Self {
            buffer: ArenaBuffer::with_capacity(capacity)?,
            table: BlockTable::new(),
        })
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Bump-allocates a block of `size` bytes holding one reference.
    ///
    /// Gaps left by reclaimed blocks are never reused; only compaction
    /// gives that space back.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if `size` does not fit before the
    /// end of the arena. Nothing is modified in that case.
    pub fn allocate(&mut self, size: usize) -> MemoryResult<BlockId> {
        let available = self.buffer.available();
        let offset = self
            .buffer
            .claim(size)
            .ok_or(MemoryError::OutOfMemory {
                requested: size,
                available,
            })?;
        let id = self.table.register(offset, size);
        debug!(%id, offset, size, "allocated block");
        Ok(id)
    }

    /// Copies `data` to the start of the block, leaving the rest untouched.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidBlock`] if the block is unknown or reclaimed
    /// - [`MemoryError::SizeMismatch`] if `data` is longer than the block
    pub fn write(&mut self, id: BlockId, data: &[u8]) -> MemoryResult<()> {
        let (offset, length) = {
            let block = self.table.live(id)?;
            (block.offset, block.length)
        };
        if data.len() > length {
            return Err(MemoryError::SizeMismatch {
                id,
                requested: data.len(),
                block_size: length,
            });
        }
        self.buffer
            .slice_mut(offset, data.len())
            .copy_from_slice(data);
        trace!(%id, len = data.len(), "wrote block");
        Ok(())
    }

    /// Returns a copy of the first `size` bytes of the block.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidBlock`] if the block is unknown or reclaimed
    /// - [`MemoryError::SizeMismatch`] if `size` exceeds the block length
    pub fn read(&self, id: BlockId, size: usize) -> MemoryResult<Vec<u8>> {
        let block = self.table.live(id)?;
        if size > block.length {
            return Err(MemoryError::SizeMismatch {
                id,
                requested: size,
                block_size: block.length,
            });
        }
        trace!(%id, size, "read block");
        Ok(self.buffer.slice(block.offset, size).to_vec())
    }

    // =========================================================================
    // Reference Counting
    // =========================================================================

    /// Adds one reference and returns the new count.
    ///
    /// A collectible block becomes allocated again.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::InvalidBlock`] if the block is unknown or reclaimed
    /// - [`MemoryError::RefCountOverflow`] if the count is already at its
    ///   maximum
    ///
    /// The table is left unchanged on error.
    pub fn increase_ref(&mut self, id: BlockId) -> MemoryResult<u32> {
        let block = self.table.live_mut(id)?;
        block.ref_count = block
            .ref_count
            .checked_add(1)
            .ok_or(MemoryError::RefCountOverflow { id })?;
        debug!(%id, ref_count = block.ref_count, "reference added");
        Ok(block.ref_count)
    }

    /// Drops one reference and returns the new count.
    ///
    /// Reaching zero only makes the block collectible. The count is clamped
    /// at zero: releasing a block that has no references left is logged and
    /// otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] if the block is unknown or
    /// reclaimed; the table is left unchanged.
    pub fn decrease_ref(&mut self, id: BlockId) -> MemoryResult<u32> {
        let block = self.table.live_mut(id)?;
        if block.ref_count == 0 {
            warn!(%id, "reference released on a block with no references");
            return Ok(0);
        }
        block.ref_count -= 1;
        debug!(%id, ref_count = block.ref_count, "reference released");
        if block.ref_count == 0 {
            debug!(%id, "block is now collectible");
        }
        Ok(block.ref_count)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the block's metadata if the id is known, live or not.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.table.get(id)
    }

    /// Returns the block table.
    pub fn table(&self) -> &BlockTable {
        &self.table
    }

    /// Returns the arena capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns the allocation frontier.
    #[inline]
    pub fn frontier(&self) -> usize {
        self.buffer.frontier()
    }

    /// Returns metadata for every entry, ordered by id.
    pub fn block_infos(&self) -> Vec<BlockInfo> {
        let mut infos: Vec<BlockInfo> = self.table.iter().map(Block::info).collect();
        infos.sort_unstable_by_key(|info| info.id);
        infos
    }

    /// Summarizes how the arena is used.
    pub fn usage(&self) -> ArenaUsage {
        let mut usage = ArenaUsage {
            capacity: self.capacity(),
            used: self.frontier(),
            free: self.buffer.available(),
            ..ArenaUsage::default()
        };
        for block in self.table.iter() {
            match block.state() {
                BlockState::Allocated => usage.live_blocks += 1,
                BlockState::Collectible => usage.collectible_blocks += 1,
                BlockState::Reclaimed => usage.reclaimed_blocks += 1,
            }
            if block.live {
                usage.live_bytes += block.length;
            }
        }
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(capacity: usize) -> ArenaState {
        ArenaState::with_capacity(capacity).unwrap()
    }

    #[test]
    fn test_allocate_bumps_offsets() {
        let mut state = state(1024);
        let a = state.allocate(50).unwrap();
        let b = state.allocate(100).unwrap();

        assert_eq!(a, BlockId::new(1));
        assert_eq!(b, BlockId::new(2));
        assert_eq!(state.block(a).unwrap().offset(), 0);
        assert_eq!(state.block(b).unwrap().offset(), 50);
        assert_eq!(state.frontier(), 150);
    }

    #[test]
    fn test_allocate_out_of_memory_has_no_effect() {
        let mut state = state(100);
        state.allocate(60).unwrap();

        let err = state.allocate(41).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::OutOfMemory {
                requested: 41,
                available: 40
            }
        ));
        assert_eq!(state.frontier(), 60);
        assert_eq!(state.table().len(), 1);
        assert_eq!(state.table().next_id(), BlockId::new(2));

        // Exact fit still succeeds
        assert!(state.allocate(40).is_ok());
        assert_eq!(state.frontier(), 100);
    }

    #[test]
    fn test_zero_sized_block() {
        let mut state = state(8);
        let id = state.allocate(0).unwrap();
        assert_eq!(state.read(id, 0).unwrap(), Vec::<u8>::new());
        assert!(state.read(id, 1).is_err());
        assert_eq!(state.frontier(), 0);
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut state = state(1024);
        let id = state.allocate(50).unwrap();
        state.write(id, b"Hola\0").unwrap();
        assert_eq!(state.read(id, 5).unwrap(), b"Hola\0");
    }

    #[test]
    fn test_partial_write_keeps_tail() {
        let mut state = state(16);
        let id = state.allocate(8).unwrap();
        state.write(id, &[9; 8]).unwrap();
        state.write(id, &[1, 2]).unwrap();
        assert_eq!(state.read(id, 8).unwrap(), vec![1, 2, 9, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_fresh_block_reads_zero() {
        let mut state = state(16);
        let id = state.allocate(4).unwrap();
        assert_eq!(state.read(id, 4).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_size_mismatch_leaves_bytes() {
        let mut state = state(16);
        let id = state.allocate(4).unwrap();
        state.write(id, &[7; 4]).unwrap();

        let err = state.write(id, &[1; 5]).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::SizeMismatch {
                requested: 5,
                block_size: 4,
                ..
            }
        ));
        assert!(matches!(
            state.read(id, 5),
            Err(MemoryError::SizeMismatch { .. })
        ));
        assert_eq!(state.read(id, 4).unwrap(), vec![7; 4]);
    }

    #[test]
    fn test_writes_do_not_cross_blocks() {
        let mut state = state(16);
        let a = state.allocate(4).unwrap();
        let b = state.allocate(4).unwrap();
        state.write(b, &[5; 4]).unwrap();
        state.write(a, &[1; 4]).unwrap();
        assert_eq!(state.read(b, 4).unwrap(), vec![5; 4]);
    }

    #[test]
    fn test_unknown_block_is_invalid() {
        let mut state = state(16);
        let ghost = BlockId::new(42);
        assert!(matches!(
            state.write(ghost, &[1]),
            Err(MemoryError::InvalidBlock { .. })
        ));
        assert!(matches!(
            state.read(ghost, 1),
            Err(MemoryError::InvalidBlock { .. })
        ));
        assert!(state.increase_ref(ghost).is_err());
        assert!(state.decrease_ref(ghost).is_err());
        assert!(state.read(BlockId::NULL, 0).is_err());
    }

    #[test]
    fn test_refcount_transitions() {
        let mut state = state(16);
        let id = state.allocate(4).unwrap();

        assert_eq!(state.increase_ref(id).unwrap(), 2);
        assert_eq!(state.decrease_ref(id).unwrap(), 1);
        assert_eq!(state.decrease_ref(id).unwrap(), 0);
        assert_eq!(state.block(id).unwrap().state(), BlockState::Collectible);

        // Collectible blocks are still readable and can be revived
        assert!(state.read(id, 4).is_ok());
        assert_eq!(state.increase_ref(id).unwrap(), 1);
        assert_eq!(state.block(id).unwrap().state(), BlockState::Allocated);
    }

    #[test]
    fn test_refcount_underflow_is_clamped() {
        let mut state = state(16);
        let id = state.allocate(4).unwrap();
        state.decrease_ref(id).unwrap();
        assert_eq!(state.decrease_ref(id).unwrap(), 0);
        assert_eq!(state.block(id).unwrap().ref_count(), 0);
        assert_eq!(state.increase_ref(id).unwrap(), 1);
    }

    #[test]
    fn test_refcount_overflow_is_rejected() {
        let mut state = state(16);
        let id = state.allocate(4).unwrap();
        state.table.live_mut(id).unwrap().ref_count = u32::MAX;

        assert!(matches!(
            state.increase_ref(id),
            Err(MemoryError::RefCountOverflow { .. })
        ));
        assert_eq!(state.block(id).unwrap().ref_count(), u32::MAX);
        assert_eq!(state.decrease_ref(id).unwrap(), u32::MAX - 1);
        assert_eq!(state.increase_ref(id).unwrap(), u32::MAX);
    }

    #[test]
    fn test_usage() {
        let mut state = state(100);
        let a = state.allocate(10).unwrap();
        state.allocate(20).unwrap();
        state.decrease_ref(a).unwrap();

        let usage = state.usage();
        assert_eq!(usage.capacity, 100);
        assert_eq!(usage.used, 30);
        assert_eq!(usage.free, 70);
        assert_eq!(usage.live_blocks, 1);
        assert_eq!(usage.collectible_blocks, 1);
        assert_eq!(usage.reclaimed_blocks, 0);
        assert_eq!(usage.live_bytes, 30);
    }

    #[test]
    fn test_block_infos_sorted_by_id() {
        let mut state = state(100);
        for size in [3, 1, 2] {
            state.allocate(size).unwrap();
        }
        let ids: Vec<u64> = state
            .block_infos()
            .iter()
            .map(|info| info.id.as_u64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
