//! # Arena Frames
//!
//! Scoped checkpoints over an [`Arena`]. A frame remembers the bump position
//! when it was opened and puts it back when it is closed or dropped.
//!
//! ```text
//!   pos:  0 ......... 96 .................. 352
//!         [ outer data ][ frame allocations ]
//!                      ^ saved
//!   drop(frame)  =>  pos = 96
//! ```
//!
//! The frame holds the arena's `&mut` borrow, so while it is open the arena
//! can only be reached through it. An inner frame borrows the outer frame,
//! which makes out-of-order closing a compile error.

use std::ops::Deref;

use bytemuck::Pod;

use super::arena::{Arena, ArenaArray, ArenaSlice};
use crate::error::MemoryResult;

/// An open checkpoint on an arena.
///
/// Read access to the arena (`get`, `used`, `remaining`, ...) goes through
/// `Deref`. Mutation is limited to allocation, element writes and nested
/// frames; [`Arena::clear`] is not reachable while a frame is open.
///
/// # Example
///
/// ```rust
/// use arcade_core::Arena;
///
/// let mut arena = Arena::with_capacity(4096);
/// let before = arena.used();
///
/// let mut frame = arena.start_frame();
/// let tmp = frame.alloc(512);
/// assert!(frame.get(tmp).is_some());
/// frame.end();
///
/// assert_eq!(arena.used(), before);
/// ```
pub struct ArenaFrame<'a> {
    /// The arena this frame was opened on.
    arena: &'a mut Arena,
    /// Bump position at the time the frame was opened.
    saved: usize,
}

impl<'a> ArenaFrame<'a> {
    /// Opens a frame at the arena's current bump position.
    pub(crate) fn new(arena: &'a mut Arena) -> Self {
        let saved = arena.used();
        Self { arena, saved }
    }

    /// Returns the bump position this frame restores on close.
    #[inline]
    #[must_use]
    pub const fn saved_pos(&self) -> usize {
        self.saved
    }

    /// Bytes allocated since the frame was opened.
    #[inline]
    #[must_use]
    pub fn frame_used(&self) -> usize {
        self.arena.used() - self.saved
    }

    /// See [`Arena::alloc`].
    ///
    /// # Panics
    ///
    /// Panics if the arena cannot fit the aligned size.
    pub fn alloc(&mut self, size: usize) -> ArenaSlice {
        self.arena.alloc(size)
    }

    /// See [`Arena::alloc_aligned`].
    ///
    /// # Panics
    ///
    /// Panics on a bad alignment or if the arena cannot fit the aligned size.
    pub fn alloc_aligned(&mut self, size: usize, align: usize) -> ArenaSlice {
        self.arena.alloc_aligned(size, align)
    }

    /// See [`Arena::try_alloc`].
    ///
    /// # Errors
    ///
    /// Returns `ArenaExhausted` if the aligned size does not fit.
    pub fn try_alloc(&mut self, size: usize) -> MemoryResult<ArenaSlice> {
        self.arena.try_alloc(size)
    }

    /// See [`Arena::try_alloc_aligned`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidAlignment`, `SizeOverflow` or `ArenaExhausted`.
    pub fn try_alloc_aligned(&mut self, size: usize, align: usize) -> MemoryResult<ArenaSlice> {
        self.arena.try_alloc_aligned(size, align)
    }

    /// See [`Arena::alloc_array`].
    ///
    /// # Panics
    ///
    /// Panics if the array does not fit.
    pub fn alloc_array<T: Pod>(&mut self, count: usize) -> ArenaArray<T> {
        self.arena.alloc_array(count)
    }

    /// See [`Arena::try_alloc_array`].
    ///
    /// # Errors
    ///
    /// Returns `ZeroSizedType`, `SizeOverflow` or `ArenaExhausted`.
    pub fn try_alloc_array<T: Pod>(&mut self, count: usize) -> MemoryResult<ArenaArray<T>> {
        self.arena.try_alloc_array(count)
    }

    /// See [`Arena::get_mut`].
    pub fn get_mut(&mut self, slice: ArenaSlice) -> Option<&mut [u8]> {
        self.arena.get_mut(slice)
    }

    /// See [`Arena::array_mut`].
    pub fn array_mut<T: Pod>(&mut self, array: &ArenaArray<T>) -> Option<&mut [T]> {
        self.arena.array_mut(array)
    }

    /// Opens a nested frame. It must be closed before this one can be used
    /// again.
    pub fn start_frame(&mut self) -> ArenaFrame<'_> {
        ArenaFrame::new(self.arena)
    }

    /// Closes the frame, restoring the saved bump position.
    ///
    /// Equivalent to dropping the frame.
    #[inline]
    pub fn end(self) {}
}

impl Deref for ArenaFrame<'_> {
    type Target = Arena;

    fn deref(&self) -> &Arena {
        &*self.arena
    }
}

impl Drop for ArenaFrame<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            saved = self.saved,
            released = self.arena.used() - self.saved,
            "arena frame closed"
        );
        self.arena.rewind(self.saved);
    }
}
