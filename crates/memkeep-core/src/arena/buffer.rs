//! The arena byte buffer.
//!
//! One contiguous allocation, obtained once at construction, with a bump
//! frontier marking how much of it has been claimed. Everything past the
//! frontier is zeroed, so a freshly claimed block always reads as zeros.

use memkeep_common::{MemoryError, MemoryResult};

/// Fixed-capacity byte buffer with a bump frontier.
///
/// # Thread Safety
///
/// The buffer is NOT synchronized. The memory manager only touches it while
/// holding its guard.
pub struct ArenaBuffer {
    /// The backing bytes.
    data: Box<[u8]>,
    /// Bytes claimed from the start of `data`.
    frontier: usize,
}

impl ArenaBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::AllocationFailure`] if the system refuses the
    /// reservation.
    pub fn with_capacity(capacity: usize) -> MemoryResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|e| MemoryError::AllocationFailure {
                capacity,
                reason: e.to_string(),
            })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            frontier: 0,
        })
    }

    /// Returns the total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the allocation frontier.
    #[inline]
    pub fn frontier(&self) -> usize {
        self.frontier
    }

    /// Returns the bytes left between the frontier and the end.
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.frontier
    }

    /// Claims `size` bytes at the frontier and returns their offset.
    ///
    /// Returns `None` without moving the frontier if they do not fit.
    pub(crate) fn claim(&mut self, size: usize) -> Option<usize> {
        let end = self.frontier.checked_add(size)?;
        if end > self.capacity() {
            return None;
        }
        let offset = self.frontier;
        self.frontier = end;
        Some(offset)
    }

    /// Returns `len` bytes starting at `offset`.
    #[inline]
    pub(crate) fn slice(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Returns `len` mutable bytes starting at `offset`.
    #[inline]
    pub(crate) fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.data[offset..offset + len]
    }

    /// Moves `len` bytes from `src` to `dst`. The ranges may overlap.
    pub(crate) fn move_within(&mut self, src: usize, len: usize, dst: usize) {
        if src != dst && len > 0 {
            self.data.copy_within(src..src + len, dst);
        }
    }

    /// Pulls the frontier back to `frontier`, zeroing the released tail.
    pub(crate) fn rewind(&mut self, frontier: usize) {
        debug_assert!(frontier <= self.frontier);
        self.data[frontier..self.frontier].fill(0);
        self.frontier = frontier;
    }
}

impl std::fmt::Debug for ArenaBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaBuffer")
            .field("capacity", &self.capacity())
            .field("frontier", &self.frontier)
            .finish()
    }
}
