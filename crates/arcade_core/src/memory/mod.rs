//! # Memory Management
//!
//! Fixed-budget allocators for the game loop.
//!
//! ## Design Philosophy
//!
//! Every block is claimed once at startup. During gameplay:
//! - No heap allocations
//! - No garbage collection
//! - Exhaustion is loud: the arena panics, the free list reports it
//!
//! The [`Arena`] and the [`FreeListAllocator`] are independent and share no
//! state.

mod align;
mod arena;
mod frame;
mod free_list;

pub use align::{align_up, DEFAULT_ALIGNMENT};
pub use arena::{Arena, ArenaArray, ArenaSlice};
pub use frame::ArenaFrame;
pub use free_list::{
    AllocatorStats, ArrayHandle, BlockHandle, FreeListAllocator, Span, HEADER_SIZE,
};
