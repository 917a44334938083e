//! # Memory Context
//!
//! Owns the game's allocator and arena. Created once at startup and passed
//! to whatever needs memory; there is no global allocator.

use crate::config::MemoryConfig;
use crate::error::MemoryResult;
use crate::memory::{Arena, FreeListAllocator};

/// The memory services of one game instance.
///
/// # Example
///
/// ```rust
/// use arcade_core::{MemoryConfig, MemoryContext};
///
/// let config = MemoryConfig { allocator_bytes: 64 * 1024, arena_bytes: 4096 };
/// let mut memory = MemoryContext::new(&config)?;
///
/// let scores = memory.allocator_mut().alloc_array::<u32>(100)?;
/// assert_eq!(memory.allocator().array(&scores)?.len(), 100);
/// # Ok::<(), arcade_core::MemoryError>(())
/// ```
pub struct MemoryContext {
    /// General-purpose allocator for long-lived game arrays.
    allocator: FreeListAllocator,
    /// Scratch arena.
    arena: Arena,
}

impl MemoryContext {
    /// Claims both blocks described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `BlockTooSmall` if the allocator budget
    /// cannot hold a single record.
    pub fn new(config: &MemoryConfig) -> MemoryResult<Self> {
        config.validate()?;

        let allocator =
            FreeListAllocator::try_new(vec![0u8; config.allocator_bytes].into_boxed_slice())?;
        let arena = Arena::with_capacity(config.arena_bytes);

        tracing::info!(
            allocator_bytes = config.allocator_bytes,
            arena_bytes = config.arena_bytes,
            "memory budget claimed"
        );

        Ok(Self { allocator, arena })
    }

    /// Returns the free-list allocator.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &FreeListAllocator {
        &self.allocator
    }

    /// Returns the free-list allocator mutably.
    #[inline]
    pub fn allocator_mut(&mut self) -> &mut FreeListAllocator {
        &mut self.allocator
    }

    /// Returns the arena.
    #[inline]
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Returns the arena mutably.
    #[inline]
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Borrows both services mutably at once.
    #[inline]
    pub fn split_mut(&mut self) -> (&mut FreeListAllocator, &mut Arena) {
        (&mut self.allocator, &mut self.arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemoryError;
    use crate::memory::HEADER_SIZE;

    #[test]
    fn test_context_claims_budget() {
        let config = MemoryConfig {
            allocator_bytes: 4096,
            arena_bytes: 1024,
        };
        let memory = MemoryContext::new(&config).unwrap();
        assert_eq!(memory.allocator().capacity(), 4096);
        assert_eq!(memory.arena().capacity(), 1024);
        assert_eq!(memory.allocator().largest_gap(), 4096 - HEADER_SIZE);
    }

    #[test]
    fn test_context_rejects_tiny_allocator() {
        let config = MemoryConfig {
            allocator_bytes: HEADER_SIZE,
            arena_bytes: 0,
        };
        assert!(matches!(
            MemoryContext::new(&config),
            Err(MemoryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_split_mut_uses_both() {
        let config = MemoryConfig {
            allocator_bytes: 1024,
            arena_bytes: 256,
        };
        let mut memory = MemoryContext::new(&config).unwrap();
        let (allocator, arena) = memory.split_mut();

        let block = allocator.alloc(64).unwrap();
        let mut frame = arena.start_frame();
        let scratch = frame.alloc(64);
        frame.get_mut(scratch).unwrap().copy_from_slice(allocator.bytes(&block).unwrap());
        frame.end();

        allocator.free(block).unwrap();
        assert_eq!(memory.arena().used(), 0);
    }
}
