//! # Arcade Jam Core
//!
//! Manual memory subsystem for a real-time arcade game:
//! - A bump [`Arena`] with scoped [`ArenaFrame`] checkpoints
//! - A best-fit, coalescing [`FreeListAllocator`] with intrusive headers
//! - A [`MemoryContext`] that owns both, built from a [`MemoryConfig`]
//!
//! ## Architecture Rules
//!
//! 1. **One budget** - Blocks are claimed once at startup and never grow
//! 2. **No globals** - The context is passed explicitly to whoever allocates
//! 3. **Handles, not pointers** - Blocks are reached through opaque handles
//!
//! ## Example
//!
//! ```rust
//! use arcade_core::{MemoryConfig, MemoryContext};
//!
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
//! #[repr(C)]
//! struct Projectile {
//!     x: f32,
//!     y: f32,
//!     vx: f32,
//!     vy: f32,
//! }
//!
//! let mut memory = MemoryContext::new(&MemoryConfig::default())?;
//! let projectiles = memory.allocator_mut().alloc_array::<Projectile>(512)?;
//! memory.allocator_mut().array_mut(&projectiles)?[0].vx = 4.0;
//! # Ok::<(), arcade_core::MemoryError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod context;
pub mod error;
pub mod memory;

pub use config::{MemoryConfig, MIB};
pub use context::MemoryContext;
pub use error::{MemoryError, MemoryResult};
pub use memory::{
    align_up, AllocatorStats, Arena, ArenaArray, ArenaFrame, ArenaSlice, ArrayHandle,
    BlockHandle, FreeListAllocator, Span, DEFAULT_ALIGNMENT, HEADER_SIZE,
};
