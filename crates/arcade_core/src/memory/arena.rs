//! # Arena Allocator
//!
//! A bump allocator over one fixed block. Allocations are never freed
//! individually; they are reclaimed in bulk by closing an [`ArenaFrame`] or by
//! [`Arena::clear`].

use std::marker::PhantomData;

use bytemuck::Pod;

use super::align::{align_up, check_alignment, padding_at, DEFAULT_ALIGNMENT};
use super::frame::ArenaFrame;
use crate::error::{MemoryError, MemoryResult};

/// Location of an arena allocation.
///
/// Slices are plain offsets into the arena block. Once the bump position is
/// rewound below the end of a slice, lookups through it return `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaSlice {
    /// Offset from the start of the block.
    offset: usize,
    /// Usable length in bytes.
    len: usize,
}

impl ArenaSlice {
    /// Returns the offset of the slice inside the arena block.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Returns the usable length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.len
    }

    /// Returns true for zero-length slices.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }

    /// One past the last byte.
    #[inline]
    const fn end(self) -> usize {
        self.offset + self.len
    }
}

/// Typed array living in an arena.
///
/// The start of the array is aligned for `T` at its real address.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ArenaArray<T> {
    /// Byte range holding the elements.
    slice: ArenaSlice,
    /// Number of elements.
    count: usize,
    /// Marker for T.
    _phantom: PhantomData<T>,
}

impl<T> Clone for ArenaArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaArray<T> {}

impl<T> ArenaArray<T> {
    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Returns the underlying byte range.
    #[inline]
    #[must_use]
    pub const fn slice(&self) -> ArenaSlice {
        self.slice
    }
}

/// A bump-pointer arena over a fixed, exclusively owned block.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per thread.
///
/// # Example
///
/// ```rust
/// use arcade_core::Arena;
///
/// let mut arena = Arena::with_capacity(1024);
/// let scratch = arena.alloc(100);
/// assert_eq!(arena.get(scratch).map(<[u8]>::len), Some(100));
///
/// {
///     let mut frame = arena.start_frame();
///     frame.alloc(256);
/// } // frame closed, the 256 bytes are reclaimed
///
/// arena.clear();
/// assert_eq!(arena.used(), 0);
/// ```
pub struct Arena {
    /// The backing block.
    block: Box<[u8]>,
    /// Current bump position.
    pos: usize,
    /// Largest bump position ever reached.
    high_water: usize,
}

impl Arena {
    /// Creates an arena that takes ownership of `block`.
    ///
    /// # Arguments
    ///
    /// * `block` - Backing storage; its length is the arena capacity
    #[must_use]
    pub fn new(block: Box<[u8]>) -> Self {
        tracing::debug!(capacity = block.len(), "arena created");
        Self {
            block,
            pos: 0,
            high_water: 0,
        }
    }

    /// Creates an arena over a freshly allocated block of `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(vec![0u8; capacity].into_boxed_slice())
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.block.len()
    }

    /// Returns the current bump position in bytes.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.pos
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.pos
    }

    /// Returns the largest bump position reached since creation.
    #[inline]
    #[must_use]
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Allocates `size` zeroed bytes with the default alignment.
    ///
    /// # Panics
    ///
    /// Panics if the arena cannot fit the aligned size. The arena is a hard
    /// memory budget; use [`Arena::try_alloc`] to handle exhaustion instead.
    pub fn alloc(&mut self, size: usize) -> ArenaSlice {
        self.alloc_aligned(size, DEFAULT_ALIGNMENT)
    }

    /// Allocates `size` zeroed bytes, rounding the size up to `align`.
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or the arena cannot fit the
    /// aligned size.
    pub fn alloc_aligned(&mut self, size: usize, align: usize) -> ArenaSlice {
        match self.try_alloc_aligned(size, align) {
            Ok(slice) => slice,
            Err(err) => {
                tracing::error!(%err, size, align, "arena budget blown");
                panic!("can't fit arena allocation: {err}");
            }
        }
    }

    /// Fallible form of [`Arena::alloc`].
    ///
    /// # Errors
    ///
    /// Returns `ArenaExhausted` if the aligned size does not fit.
    pub fn try_alloc(&mut self, size: usize) -> MemoryResult<ArenaSlice> {
        self.try_alloc_aligned(size, DEFAULT_ALIGNMENT)
    }

    /// Fallible form of [`Arena::alloc_aligned`].
    ///
    /// The bump position advances by `size` rounded up to `align`; the
    /// returned slice starts at the pre-bump position and the whole rounded
    /// range is zeroed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAlignment`, `SizeOverflow` or `ArenaExhausted`.
    pub fn try_alloc_aligned(&mut self, size: usize, align: usize) -> MemoryResult<ArenaSlice> {
        check_alignment(align)?;
        let aligned = align_up(size, align).ok_or(MemoryError::SizeOverflow)?;

        let remaining = self.remaining();
        if aligned > remaining {
            return Err(MemoryError::ArenaExhausted {
                requested: aligned,
                remaining,
            });
        }

        let offset = self.pos;
        self.pos += aligned;
        self.high_water = self.high_water.max(self.pos);
        self.block[offset..self.pos].fill(0);

        Ok(ArenaSlice { offset, len: size })
    }

    /// Allocates a zeroed array of `count` elements of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the array does not fit, `T` is zero-sized, or the byte size
    /// overflows.
    pub fn alloc_array<T: Pod>(&mut self, count: usize) -> ArenaArray<T> {
        match self.try_alloc_array(count) {
            Ok(array) => array,
            Err(err) => {
                tracing::error!(%err, count, "arena budget blown");
                panic!("can't fit arena array: {err}");
            }
        }
    }

    /// Fallible form of [`Arena::alloc_array`].
    ///
    /// # Errors
    ///
    /// Returns `ZeroSizedType`, `SizeOverflow` or `ArenaExhausted`.
    pub fn try_alloc_array<T: Pod>(&mut self, count: usize) -> MemoryResult<ArenaArray<T>> {
        let elem = std::mem::size_of::<T>();
        if elem == 0 {
            return Err(MemoryError::ZeroSizedType);
        }
        let bytes = elem.checked_mul(count).ok_or(MemoryError::SizeOverflow)?;

        // Padding is measured at the real address of the bump position.
        let pad = padding_at(&self.block[self.pos..], std::mem::align_of::<T>());
        let request = bytes.checked_add(pad).ok_or(MemoryError::SizeOverflow)?;
        let raw = self.try_alloc(request)?;

        Ok(ArenaArray {
            slice: ArenaSlice {
                offset: raw.offset + pad,
                len: bytes,
            },
            count,
            _phantom: PhantomData,
        })
    }

    /// Returns the bytes of a live slice.
    ///
    /// Returns None if the slice reaches past the bump position, which is the
    /// case for slices released by a frame restore or a clear.
    #[must_use]
    pub fn get(&self, slice: ArenaSlice) -> Option<&[u8]> {
        if slice.end() > self.pos {
            return None;
        }
        self.block.get(slice.offset..slice.end())
    }

    /// Mutable form of [`Arena::get`].
    pub fn get_mut(&mut self, slice: ArenaSlice) -> Option<&mut [u8]> {
        if slice.end() > self.pos {
            return None;
        }
        self.block.get_mut(slice.offset..slice.end())
    }

    /// Returns the elements of a live array.
    #[must_use]
    pub fn array<T: Pod>(&self, array: &ArenaArray<T>) -> Option<&[T]> {
        bytemuck::try_cast_slice(self.get(array.slice)?).ok()
    }

    /// Mutable form of [`Arena::array`].
    pub fn array_mut<T: Pod>(&mut self, array: &ArenaArray<T>) -> Option<&mut [T]> {
        bytemuck::try_cast_slice_mut(self.get_mut(array.slice)?).ok()
    }

    /// Opens a frame at the current bump position.
    ///
    /// Everything allocated through the frame is reclaimed when it is closed
    /// or dropped. Frames nest: an inner frame borrows the outer one, so they
    /// always close in reverse order of creation.
    pub fn start_frame(&mut self) -> ArenaFrame<'_> {
        ArenaFrame::new(self)
    }

    /// Resets the bump position to zero, releasing every allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.pos = 0;
    }

    /// Moves the bump position back to a frame's saved position.
    #[inline]
    pub(crate) fn rewind(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos, "frame restore cannot move forward");
        self.pos = pos;
    }
}
