//! # Memory Error Types
//!
//! All errors that can occur in the memory subsystem.

use thiserror::Error;

/// Errors that can occur in the memory subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The arena cannot fit the (aligned) request.
    #[error("arena exhausted: requested {requested} bytes, {remaining} remaining")]
    ArenaExhausted {
        /// Aligned size that was requested.
        requested: usize,
        /// Bytes left between the bump position and the end of the block.
        remaining: usize,
    },

    /// Alignment was zero or not a power of two.
    #[error("invalid alignment: {0} is not a power of two")]
    InvalidAlignment(usize),

    /// No free gap is large enough for the request.
    #[error("allocator out of memory: requested {requested} bytes, largest gap is {largest_gap}")]
    OutOfMemory {
        /// Bytes that were requested.
        requested: usize,
        /// Size of the largest free gap at the time of the request.
        largest_gap: usize,
    },

    /// The backing block cannot hold even one record header.
    #[error("allocator block too small: {size} bytes, need more than {minimum}")]
    BlockTooSmall {
        /// Size of the block that was provided.
        size: usize,
        /// Size of one record header.
        minimum: usize,
    },

    /// A size computation overflowed `usize`.
    #[error("allocation size overflow")]
    SizeOverflow,

    /// Typed allocation of a zero-sized type.
    #[error("cannot allocate an array of a zero-sized type")]
    ZeroSizedType,

    /// The handle was issued by a different allocator.
    #[error("handle belongs to a different allocator")]
    ForeignHandle,

    /// No live allocation starts at this header offset.
    #[error("no live allocation at offset {0}")]
    UnknownBlock(usize),

    /// The intrusive lists are inconsistent.
    #[error("allocator corrupted at offset {offset}: {reason}")]
    Corrupted {
        /// Header offset where the violation was found.
        offset: usize,
        /// Which invariant failed.
        reason: &'static str,
    },

    /// Invalid memory budget configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
