//! # Block Handles
//!
//! Opaque tokens for live allocations. A handle is the only way to reach or
//! free a block, and freeing consumes it, so the same block cannot be freed
//! twice through safe code.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use super::header::HEADER_SIZE;

/// Identifies the allocator a handle was issued by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct AllocatorId(u32);

impl AllocatorId {
    /// Returns a fresh id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a live block in a [`FreeListAllocator`](super::FreeListAllocator).
///
/// Not `Clone`: [`FreeListAllocator::free`](super::FreeListAllocator::free)
/// takes it by value.
#[must_use = "dropping a block handle leaks the block"]
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    /// Allocator that issued this handle.
    pub(crate) owner: AllocatorId,
    /// Offset of the block's record header.
    pub(crate) header: usize,
}

impl BlockHandle {
    /// Returns the offset of the usable bytes inside the allocator block.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.header + HEADER_SIZE
    }
}

/// Handle to a typed array in a [`FreeListAllocator`](super::FreeListAllocator).
///
/// The array starts `pad` bytes into its block so that it is aligned for `T`.
#[must_use = "dropping an array handle leaks the block"]
#[derive(Debug)]
pub struct ArrayHandle<T> {
    /// The untyped block backing the array.
    pub(crate) block: BlockHandle,
    /// Bytes skipped at the start of the block for alignment.
    pub(crate) pad: usize,
    /// Number of elements.
    pub(crate) count: usize,
    /// Marker for T.
    pub(crate) _phantom: PhantomData<T>,
}

impl<T> ArrayHandle<T> {
    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns the offset of the first element inside the allocator block.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.block.offset() + self.pad
    }

    /// Gives up the element type, returning the untyped block handle.
    #[inline]
    pub fn into_block(self) -> BlockHandle {
        self.block
    }
}
