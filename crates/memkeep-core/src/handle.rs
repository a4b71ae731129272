//! Reference-counted typed handles.
//!
//! A [`Handle<T>`] names a block by id and owns exactly one unit of that
//! block's reference count. Cloning adds a reference, dropping releases
//! one, and [`Handle::assign`] releases the old block before referencing
//! the new one. The null handle (id 0) owns nothing.
//!
//! Handles never hold addresses: every [`Handle::get`] and [`Handle::set`]
//! resolves the block's current offset under the manager lock, so values
//! stay reachable across compaction.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use memkeep_common::{BlockId, MemoryError, MemoryResult};
use tracing::warn;

use crate::manager::{Core, MemoryManager};
use crate::value::BlockValue;

/// An owning, typed reference to an arena block.
///
/// # Example
///
/// ```rust
/// use memkeep_common::ManagerConfig;
/// use memkeep_core::{Handle, MemoryManager};
///
/// let manager = MemoryManager::new(ManagerConfig::new(1024).with_collector(false)).unwrap();
/// let a = Handle::with_value(&manager, 42u32).unwrap();
/// let b = a.clone();
/// assert_eq!(a.ref_count(), Some(2));
/// drop(b);
/// assert_eq!(a.get().unwrap(), 42);
/// ```
pub struct Handle<T: BlockValue> {
    id: BlockId,
    core: Option<Arc<Core>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: BlockValue> Handle<T> {
    /// Returns the null handle.
    pub fn null() -> Self {
        Self {
            id: BlockId::NULL,
            core: None,
            _marker: PhantomData,
        }
    }

    /// Allocates a zeroed block sized for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the arena is full.
    pub fn new(manager: &MemoryManager) -> MemoryResult<Self> {
        let id = manager.create(T::SIZE)?;
        Ok(Self::owning(manager.core(), id))
    }

    /// Allocates a block for `T` and stores `value` in it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the arena is full.
    pub fn with_value(manager: &MemoryManager, value: T) -> MemoryResult<Self> {
        let handle = Self::new(manager)?;
        handle.set(&value)?;
        Ok(handle)
    }

    /// Adds a reference to an existing block and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] if the block is not live.
    pub fn acquire(manager: &MemoryManager, id: BlockId) -> MemoryResult<Self> {
        if id.is_null() {
            return Ok(Self::null());
        }
        manager.core().increase_ref(id)?;
        Ok(Self::owning(manager.core(), id))
    }

    /// Wraps a reference previously given up by [`Handle::into_raw`].
    ///
    /// The count is not touched: the new handle takes over the reference
    /// the raw id stands for. Passing an id that does not carry such a
    /// reference makes the count fall short by one when the handle drops.
    pub fn from_raw(manager: &MemoryManager, id: BlockId) -> Self {
        if id.is_null() {
            return Self::null();
        }
        Self::owning(manager.core(), id)
    }

    /// Gives up the handle without releasing its reference.
    pub fn into_raw(mut self) -> BlockId {
        self.core = None;
        self.id
    }

    fn owning(core: &Arc<Core>, id: BlockId) -> Self {
        Self {
            id,
            core: Some(Arc::clone(core)),
            _marker: PhantomData,
        }
    }

    /// Returns the block id.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns true for the null handle.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.id.is_null()
    }

    /// Reads the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] for a null or dead handle.
    pub fn get(&self) -> MemoryResult<T> {
        let bytes = self.core()?.read(self.id, T::SIZE)?;
        Ok(T::decode_from(&bytes))
    }

    /// Stores `value`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidBlock`] for a null or dead handle.
    pub fn set(&self, value: &T) -> MemoryResult<()> {
        let mut buf = vec![0u8; T::SIZE];
        value.encode_into(&mut buf);
        self.core()?.write(self.id, &buf)
    }

    /// Returns the block's current reference count.
    pub fn ref_count(&self) -> Option<u32> {
        self.core.as_ref()?.live_ref_count(self.id)
    }

    /// Makes this handle refer to the same block as `other`.
    ///
    /// The old block is released first, then the new one is referenced.
    /// Assigning a handle to the same block is a no-op.
    pub fn assign(&mut self, other: &Self) {
        if self.id == other.id {
            return;
        }
        self.release();
        *self = other.clone();
    }

    fn core(&self) -> MemoryResult<&Arc<Core>> {
        self.core
            .as_ref()
            .ok_or(MemoryError::InvalidBlock { id: self.id })
    }

    fn release(&mut self) {
        if let Some(core) = self.core.take() {
            if let Err(e) = core.decrease_ref(self.id) {
                warn!(id = %self.id, error = %e, "handle released a dead block");
            }
        }
        self.id = BlockId::NULL;
    }
}

impl<T: BlockValue> Clone for Handle<T> {
    /// Adds a reference. Cloning a handle whose block is no longer live
    /// yields a detached handle with the same id that owns nothing.
    fn clone(&self) -> Self {
        let core = self.core.as_ref().and_then(|core| match core.increase_ref(self.id) {
            Ok(_) => Some(Arc::clone(core)),
            Err(e) => {
                warn!(id = %self.id, error = %e, "cloned handle to a dead block");
                None
            }
        });
        Self {
            id: self.id,
            core,
            _marker: PhantomData,
        }
    }
}

impl<T: BlockValue> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: BlockValue> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: BlockValue> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: BlockValue> Eq for Handle<T> {}

impl<T: BlockValue> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("type", &std::any::type_name::<T>())
            .field("owning", &self.core.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memkeep_common::ManagerConfig;

    fn manager() -> MemoryManager {
        MemoryManager::new(ManagerConfig::new(1024).with_collector(false)).unwrap()
    }

    #[test]
    fn test_null_handle() {
        let handle: Handle<u64> = Handle::null();
        assert!(handle.is_null());
        assert_eq!(handle.ref_count(), None);
        assert!(matches!(handle.get(), Err(MemoryError::InvalidBlock { .. })));
        assert_eq!(Handle::<u64>::default(), handle);
    }

    #[test]
    fn test_new_handle_is_zeroed() {
        let manager = manager();
        let handle: Handle<u64> = Handle::new(&manager).unwrap();
        assert!(!handle.is_null());
        assert_eq!(handle.get().unwrap(), 0);
        assert_eq!(handle.ref_count(), Some(1));
        assert_eq!(manager.block_info(handle.id()).unwrap().length, 8);
    }

    #[test]
    fn test_set_and_get() {
        let manager = manager();
        let handle = Handle::with_value(&manager, -7i32).unwrap();
        assert_eq!(handle.get().unwrap(), -7);
        handle.set(&99).unwrap();
        assert_eq!(handle.get().unwrap(), 99);
    }

    #[test]
    fn test_clone_and_drop_track_count() {
        let manager = manager();
        let a: Handle<u8> = Handle::new(&manager).unwrap();
        let id = a.id();

        let b = a.clone();
        let c = b.clone();
        assert_eq!(manager.ref_count(id), Some(3));

        drop(b);
        drop(c);
        assert_eq!(manager.ref_count(id), Some(1));

        drop(a);
        assert_eq!(manager.ref_count(id), Some(0));
        assert!(manager.collect_garbage().did_work());
        assert!(manager.get(id, 1).is_err());
    }

    #[test]
    fn test_assign_order() {
        let manager = manager();
        let mut a = Handle::with_value(&manager, 1u16).unwrap();
        let b = Handle::with_value(&manager, 2u16).unwrap();
        let (old, new) = (a.id(), b.id());

        a.assign(&b);
        assert_eq!(a.id(), new);
        assert_eq!(a.get().unwrap(), 2);
        assert_eq!(manager.ref_count(old), Some(0));
        assert_eq!(manager.ref_count(new), Some(2));
    }

    #[test]
    fn test_self_assign_is_noop() {
        let manager = manager();
        let mut a = Handle::with_value(&manager, 5u8).unwrap();
        let b = a.clone();
        a.assign(&b);
        assert_eq!(a.ref_count(), Some(2));
    }

    #[test]
    fn test_assign_null_releases() {
        let manager = manager();
        let mut a = Handle::with_value(&manager, 5u8).unwrap();
        let id = a.id();
        a.assign(&Handle::null());
        assert!(a.is_null());
        assert_eq!(manager.ref_count(id), Some(0));
    }

    #[test]
    fn test_acquire_adds_reference() {
        let manager = manager();
        let id = manager.create(4).unwrap();
        let handle: Handle<u32> = Handle::acquire(&manager, id).unwrap();
        assert_eq!(handle.ref_count(), Some(2));

        assert!(Handle::<u32>::acquire(&manager, BlockId::new(99)).is_err());
        assert!(Handle::<u32>::acquire(&manager, BlockId::NULL).unwrap().is_null());
    }

    #[test]
    fn test_raw_round_trip_keeps_count() {
        let manager = manager();
        let handle = Handle::with_value(&manager, 11u64).unwrap();
        let id = handle.into_raw();
        assert_eq!(manager.ref_count(id), Some(1));

        let handle: Handle<u64> = Handle::from_raw(&manager, id);
        assert_eq!(handle.ref_count(), Some(1));
        assert_eq!(handle.get().unwrap(), 11);
        drop(handle);
        assert_eq!(manager.ref_count(id), Some(0));
    }

    #[test]
    fn test_value_survives_compaction() {
        let manager = manager();
        let filler: Handle<[u8; 32]> = Handle::new(&manager).unwrap();
        let value = Handle::with_value(&manager, *b"Hola\0").unwrap();
        drop(filler);

        manager.collect_garbage();
        manager.defragment();
        assert_eq!(manager.block_info(value.id()).unwrap().offset, 0);
        assert_eq!(&value.get().unwrap(), b"Hola\0");
    }

    #[test]
    fn test_clone_of_dead_block_is_detached() {
        let manager = manager();
        let id = manager.create(1).unwrap();
        let handle: Handle<u8> = Handle::from_raw(&manager, id);
        manager.decrease_ref_count(id);
        manager.collect_garbage();

        let copy = handle.clone();
        assert_eq!(copy.id(), id);
        assert_eq!(copy.ref_count(), None);
        drop(copy);
        drop(handle);
    }

    #[test]
    fn test_handle_outlives_manager() {
        let manager = manager();
        let handle = Handle::with_value(&manager, 3u32).unwrap();
        drop(manager);
        assert_eq!(handle.get().unwrap(), 3);
    }
}
