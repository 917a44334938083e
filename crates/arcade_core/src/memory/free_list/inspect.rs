//! # Allocator Inspection
//!
//! Read-only views of the intrusive lists: address-ordered iteration,
//! aggregate statistics, and a full invariant check.

use super::header::{try_read, HEADER_SIZE};
use super::{FreeListAllocator, List};
use crate::error::{MemoryError, MemoryResult};

/// Usable byte range of one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    /// Offset of the first usable byte (just past the header).
    pub offset: usize,
    /// Number of usable bytes.
    pub len: usize,
}

/// Aggregate allocator statistics.
///
/// `allocated_bytes + free_bytes + header_bytes` always equals `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Size of the backing block.
    pub capacity: usize,
    /// Number of live allocations.
    pub live_allocations: usize,
    /// Usable bytes held by live allocations.
    pub allocated_bytes: usize,
    /// Number of free gaps.
    pub free_gaps: usize,
    /// Usable bytes in free gaps.
    pub free_bytes: usize,
    /// Size of the largest free gap.
    pub largest_gap: usize,
    /// Bytes spent on record headers.
    pub header_bytes: usize,
}

impl AllocatorStats {
    /// Sum of every accounted byte; equal to `capacity` on a healthy
    /// allocator.
    #[inline]
    #[must_use]
    pub const fn accounted_bytes(&self) -> usize {
        self.allocated_bytes + self.free_bytes + self.header_bytes
    }
}

impl FreeListAllocator {
    /// Iterates live allocations in address order.
    pub fn allocations(&self) -> impl Iterator<Item = Span> + '_ {
        self.spans(List::Allocated)
    }

    /// Iterates free gaps in address order.
    pub fn free_gaps(&self) -> impl Iterator<Item = Span> + '_ {
        self.spans(List::Free)
    }

    /// Returns the size of the largest free gap, or zero if there is none.
    #[must_use]
    pub fn largest_gap(&self) -> usize {
        self.free_gaps().map(|gap| gap.len).max().unwrap_or(0)
    }

    /// Collects allocator statistics by walking both lists.
    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        let mut stats = AllocatorStats {
            capacity: self.capacity(),
            live_allocations: 0,
            allocated_bytes: 0,
            free_gaps: 0,
            free_bytes: 0,
            largest_gap: 0,
            header_bytes: 0,
        };

        for span in self.allocations() {
            stats.live_allocations += 1;
            stats.allocated_bytes += span.len;
        }
        for span in self.free_gaps() {
            stats.free_gaps += 1;
            stats.free_bytes += span.len;
            stats.largest_gap = stats.largest_gap.max(span.len);
        }
        stats.header_bytes = (stats.live_allocations + stats.free_gaps) * HEADER_SIZE;

        stats
    }

    /// Checks every structural invariant of the allocator.
    ///
    /// - Each header lies inside the block and describes its own position.
    /// - Both lists are strictly ascending by address.
    /// - No two free gaps are adjacent.
    /// - Headers and bodies of all records tile the block with no overlap
    ///   and no lost bytes.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` naming the first violated invariant.
    pub fn verify(&self) -> MemoryResult<()> {
        let live = self.collect_checked(List::Allocated)?;
        let free = self.collect_checked(List::Free)?;

        for pair in free.windows(2) {
            if pair[0].1 == pair[1].0 {
                return Err(corrupted(pair[1].0, "adjacent free gaps"));
            }
        }

        let mut ranges: Vec<(usize, usize)> = live.into_iter().chain(free).collect();
        ranges.sort_unstable();

        let mut expected = 0;
        for (at, end) in ranges {
            if at < expected {
                return Err(corrupted(at, "overlapping records"));
            }
            if at > expected {
                return Err(corrupted(expected, "bytes not covered by any record"));
            }
            expected = end;
        }
        if expected != self.capacity() {
            return Err(corrupted(expected, "bytes not covered by any record"));
        }

        Ok(())
    }

    fn spans(&self, list: List) -> impl Iterator<Item = Span> + '_ {
        self.records(list).map(|(_, record)| Span {
            offset: record.data(),
            len: record.len(),
        })
    }

    /// Walks `list` with bounds checks, returning `(header offset, end)`.
    fn collect_checked(&self, list: List) -> MemoryResult<Vec<(usize, usize)>> {
        // More records than headers fit in the block means a cycle.
        let max_records = self.capacity() / HEADER_SIZE;
        let mut ranges = Vec::new();
        let mut next = self.head(list);

        while let Some(at) = next {
            if ranges.len() >= max_records {
                return Err(corrupted(at, "list does not terminate"));
            }
            let record = try_read(&self.block, at).ok_or(corrupted(at, "header out of bounds"))?;
            if record.data() != at + HEADER_SIZE {
                return Err(corrupted(at, "header position mismatch"));
            }
            if record.end() > self.capacity() {
                return Err(corrupted(at, "record runs past the block"));
            }
            if let Some(&(prev_at, _)) = ranges.last() {
                if at <= prev_at {
                    return Err(corrupted(at, "list out of address order"));
                }
            }
            ranges.push((at, record.end()));
            next = record.next();
        }

        Ok(ranges)
    }
}

#[inline]
const fn corrupted(offset: usize, reason: &'static str) -> MemoryError {
    MemoryError::Corrupted { offset, reason }
}
