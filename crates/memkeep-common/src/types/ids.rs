//! Identifier types for memkeep.
//!
//! Block ids are handed out by the allocator in strictly increasing order
//! and are never reused while the process runs. Offsets may be recycled by
//! compaction; ids may not.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block identifier - names one allocation in the arena.
///
/// Callers never see arena addresses, only these ids, so compaction can move
/// bytes without invalidating anything a caller holds.
///
/// # Example
///
/// ```rust
/// use memkeep_common::types::BlockId;
///
/// let id = BlockId::new(42);
/// assert_eq!(id.as_u64(), 42);
/// assert!(!id.is_null());
/// assert!(BlockId::NULL.is_null());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(u64);

impl BlockId {
    /// The null id. Never refers to a block and never carries a reference count.
    pub const NULL: Self = Self(0);

    /// First id handed out by a fresh manager.
    pub const FIRST: Self = Self(1);

    /// Creates a new `BlockId` from a raw u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next id.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns true for the null id.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    /// Creates a `BlockId` from little-endian bytes.
    #[inline]
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_le_bytes(bytes))
    }

    /// Converts to little-endian bytes.
    #[inline]
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "BlockId(NULL)")
        } else {
            write!(f, "BlockId({})", self.0)
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BlockId {
    #[inline]
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<BlockId> for u64 {
    #[inline]
    fn from(id: BlockId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_basics() {
        let id = BlockId::new(7);
        assert_eq!(id.as_u64(), 7);
        assert_eq!(id.next(), BlockId::new(8));
        assert!(!id.is_null());
        assert_eq!(BlockId::FIRST.as_u64(), 1);
    }

    #[test]
    fn test_null_id() {
        assert!(BlockId::NULL.is_null());
        assert_eq!(BlockId::default(), BlockId::NULL);
        assert_eq!(format!("{:?}", BlockId::NULL), "BlockId(NULL)");
    }

    #[test]
    fn test_next_saturates() {
        let max = BlockId::new(u64::MAX);
        assert_eq!(max.next(), max);
    }

    #[test]
    fn test_byte_conversion() {
        let id = BlockId::new(0x0102_0304_0506_0708);
        assert_eq!(BlockId::from_le_bytes(id.to_le_bytes()), id);
        assert_eq!(id.to_le_bytes()[0], 0x08);
    }

    #[test]
    fn test_display_and_conversions() {
        let id: BlockId = 99u64.into();
        assert_eq!(id.to_string(), "99");
        let raw: u64 = id.into();
        assert_eq!(raw, 99);
    }

    #[test]
    fn test_ordering() {
        assert!(BlockId::new(1) < BlockId::new(2));
        assert!(BlockId::NULL < BlockId::FIRST);
    }
}
