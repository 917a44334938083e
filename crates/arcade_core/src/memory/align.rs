//! # Alignment Arithmetic
//!
//! Shared by the arena (size rounding) and by the typed array views of both
//! allocators (start padding at the real address).

use crate::error::{MemoryError, MemoryResult};

/// Default arena alignment: two pointer widths (16 bytes on 64-bit targets).
pub const DEFAULT_ALIGNMENT: usize = 2 * std::mem::size_of::<usize>();

/// Rounds `size` up to the next multiple of `align`.
///
/// A size that is already a multiple of `align` is returned unchanged.
///
/// # Arguments
///
/// * `size` - Byte count to round
/// * `align` - Power-of-two alignment
///
/// # Returns
///
/// The rounded size, or None if rounding overflows `usize`.
#[inline]
#[must_use]
pub const fn align_up(size: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match size.checked_add(align - 1) {
        Some(bumped) => Some(bumped & !(align - 1)),
        None => None,
    }
}

/// Rejects zero and non-power-of-two alignments.
#[inline]
pub(crate) fn check_alignment(align: usize) -> MemoryResult<()> {
    if align.is_power_of_two() {
        Ok(())
    } else {
        Err(MemoryError::InvalidAlignment(align))
    }
}

/// Bytes to skip from the start of `bytes` so that the next address is
/// aligned to `align`.
#[inline]
pub(crate) fn padding_at(bytes: &[u8], align: usize) -> usize {
    let addr = bytes.as_ptr() as usize;
    addr.wrapping_neg() & (align - 1)
}
