//! # Free-List Allocator
//!
//! General-purpose allocator over one fixed block, with individual
//! allocation and deallocation of variable-sized blocks.
//!
//! ## Layout
//!
//! Bookkeeping is intrusive: every range in the block starts with a
//! [`HEADER_SIZE`]-byte record header. Headers are linked into two singly
//! linked lists, both ordered by address:
//!
//! ```text
//!   block: [H|  live  ][H| free ][H|   live   ][H|     free      ]
//!   alloc list: ^--------------------^
//!   free list:             ^-----------------------^
//! ```
//!
//! Headers and bodies tile the block exactly; no byte belongs to nothing.
//!
//! ## Policy
//!
//! - **Best fit**: `alloc` takes the smallest gap that can hold the request,
//!   the lowest address on ties.
//! - **Split**: the tail of the chosen gap becomes a new gap only if it can
//!   hold more than its own header; otherwise the whole gap is handed out.
//! - **Coalesce**: `free` merges the released block with a free neighbor on
//!   either side immediately, so no two free gaps are ever adjacent.

mod handle;
mod header;
mod inspect;

pub use handle::{ArrayHandle, BlockHandle};
pub use header::HEADER_SIZE;
pub use inspect::{AllocatorStats, Span};

use std::marker::PhantomData;

use bytemuck::Pod;

use self::handle::AllocatorId;
use self::header::{read, write, RecordHeader, Records};
use super::align::padding_at;
use crate::error::{MemoryError, MemoryResult};

/// Which intrusive list an operation works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum List {
    /// Live allocations.
    Allocated,
    /// Free gaps.
    Free,
}

/// A best-fit, coalescing free-list allocator over a fixed block.
///
/// # Thread Safety
///
/// NOT thread-safe. Every mutating operation takes `&mut self`; share it
/// across threads only behind your own lock.
///
/// # Example
///
/// ```rust
/// use arcade_core::{FreeListAllocator, HEADER_SIZE};
///
/// let mut allocator = FreeListAllocator::with_capacity(1024);
///
/// let block = allocator.alloc(100)?;
/// allocator.bytes_mut(&block)?[0] = 42;
/// allocator.free(block)?;
///
/// // Everything coalesced back into one gap.
/// assert_eq!(allocator.stats().largest_gap, 1024 - HEADER_SIZE);
/// # Ok::<(), arcade_core::MemoryError>(())
/// ```
pub struct FreeListAllocator {
    /// Id stamped into every handle this allocator issues.
    id: AllocatorId,
    /// The backing block, headers included.
    block: Box<[u8]>,
    /// Header offset of the lowest live allocation.
    alloc_head: Option<usize>,
    /// Header offset of the lowest free gap.
    free_head: Option<usize>,
}

impl FreeListAllocator {
    /// Creates an allocator that takes ownership of `block`.
    ///
    /// The whole block minus one header starts out as a single free gap.
    ///
    /// # Panics
    ///
    /// Panics if the block is not larger than [`HEADER_SIZE`].
    #[must_use]
    pub fn new(block: Box<[u8]>) -> Self {
        match Self::try_new(block) {
            Ok(allocator) => allocator,
            Err(err) => panic!("allocator block is way too small: {err}"),
        }
    }

    /// Fallible form of [`FreeListAllocator::new`].
    ///
    /// # Errors
    ///
    /// Returns `BlockTooSmall` if the block is not larger than [`HEADER_SIZE`].
    pub fn try_new(mut block: Box<[u8]>) -> MemoryResult<Self> {
        let size = block.len();
        if size <= HEADER_SIZE {
            return Err(MemoryError::BlockTooSmall {
                size,
                minimum: HEADER_SIZE,
            });
        }

        write(&mut block, 0, &RecordHeader::new(0, size - HEADER_SIZE, None));
        tracing::debug!(capacity = size, "free-list allocator created");

        Ok(Self {
            id: AllocatorId::next(),
            block,
            alloc_head: None,
            free_head: Some(0),
        })
    }

    /// Creates an allocator over a freshly allocated block of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not larger than [`HEADER_SIZE`].
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(vec![0u8; capacity].into_boxed_slice())
    }

    /// Returns the size of the backing block in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.block.len()
    }

    /// Allocates `requested` zeroed bytes.
    ///
    /// Picks the best-fitting free gap; the caller gets exactly `requested`
    /// bytes when the gap is split, or the whole gap when the remainder could
    /// not hold a header of its own.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if no gap is large enough. Nothing is modified
    /// in that case.
    pub fn alloc(&mut self, requested: usize) -> MemoryResult<BlockHandle> {
        let Some((prev, at, gap)) = self.best_fit(requested) else {
            let largest_gap = self.largest_gap();
            tracing::warn!(requested, largest_gap, "free-list allocator out of memory");
            return Err(MemoryError::OutOfMemory {
                requested,
                largest_gap,
            });
        };

        let size_left = gap.len() - requested;
        let (replacement, alloc_size) = if size_left > HEADER_SIZE {
            let tail_at = gap.data() + requested;
            let tail = RecordHeader::new(tail_at, size_left - HEADER_SIZE, gap.next());
            write(&mut self.block, tail_at, &tail);
            tracing::trace!(at, requested, remainder = tail.len(), "split free gap");
            (Some(tail_at), requested)
        } else {
            (gap.next(), gap.len())
        };
        self.link_after(List::Free, prev, replacement);

        // The gap's header becomes the allocation header.
        let (alloc_prev, alloc_next) = self.find_slot(List::Allocated, at);
        let record = RecordHeader::new(at, alloc_size, alloc_next);
        write(&mut self.block, at, &record);
        self.link_after(List::Allocated, alloc_prev, Some(at));

        self.block[record.data()..record.end()].fill(0);

        Ok(BlockHandle {
            owner: self.id,
            header: at,
        })
    }

    /// Allocates a zeroed array of `count` elements of `T`.
    ///
    /// The block is over-requested by up to `align_of::<T>() - 1` bytes so
    /// the elements can start at an aligned address.
    ///
    /// # Errors
    ///
    /// Returns `ZeroSizedType`, `SizeOverflow` or `OutOfMemory`.
    pub fn alloc_array<T: Pod>(&mut self, count: usize) -> MemoryResult<ArrayHandle<T>> {
        let elem = std::mem::size_of::<T>();
        if elem == 0 {
            return Err(MemoryError::ZeroSizedType);
        }
        let align = std::mem::align_of::<T>();
        let request = elem
            .checked_mul(count)
            .and_then(|bytes| bytes.checked_add(align - 1))
            .ok_or(MemoryError::SizeOverflow)?;

        let block = self.alloc(request)?;
        let pad = padding_at(&self.block[block.offset()..], align);

        Ok(ArrayHandle {
            block,
            pad,
            count,
            _phantom: PhantomData,
        })
    }

    /// Frees a block, coalescing it with adjacent free gaps.
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` for a handle issued by another allocator, or
    /// `UnknownBlock` if the block is not on the allocation list.
    pub fn free(&mut self, handle: BlockHandle) -> MemoryResult<()> {
        self.check_owner(&handle)?;
        let at = handle.header;

        let (prev, record) = self.find_record(List::Allocated, at)?;
        self.link_after(List::Allocated, prev, record.next());

        let (prev, next) = self.find_slot(List::Free, at);
        let mut entry = RecordHeader::new(at, record.len(), next);

        if let Some(next_at) = next {
            if entry.end() == next_at {
                let following = read(&self.block, next_at);
                entry.grow(HEADER_SIZE + following.len());
                entry.set_next(following.next());
                tracing::trace!(at, absorbed = next_at, "coalesced with following gap");
            }
        }

        match prev {
            Some(prev_at) => {
                let mut preceding = read(&self.block, prev_at);
                if preceding.end() == at {
                    preceding.grow(HEADER_SIZE + entry.len());
                    preceding.set_next(entry.next());
                    tracing::trace!(at, into = prev_at, "coalesced with preceding gap");
                } else {
                    preceding.set_next(Some(at));
                    write(&mut self.block, at, &entry);
                }
                write(&mut self.block, prev_at, &preceding);
            }
            None => {
                write(&mut self.block, at, &entry);
                self.free_head = Some(at);
            }
        }

        Ok(())
    }

    /// Frees a block if there is one; `None` is a no-op.
    ///
    /// # Errors
    ///
    /// Same as [`FreeListAllocator::free`].
    pub fn free_opt(&mut self, handle: Option<BlockHandle>) -> MemoryResult<()> {
        match handle {
            Some(handle) => self.free(handle),
            None => Ok(()),
        }
    }

    /// Frees a typed array.
    ///
    /// # Errors
    ///
    /// Same as [`FreeListAllocator::free`].
    pub fn free_array<T>(&mut self, array: ArrayHandle<T>) -> MemoryResult<()> {
        self.free(array.into_block())
    }

    /// Returns the usable bytes of a live block.
    ///
    /// The slice is at least as long as the size that was requested; it is
    /// longer when the allocator handed out a whole gap.
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` for a handle issued by another allocator.
    pub fn bytes(&self, handle: &BlockHandle) -> MemoryResult<&[u8]> {
        self.check_owner(handle)?;
        let record = read(&self.block, handle.header);
        Ok(&self.block[record.data()..record.end()])
    }

    /// Mutable form of [`FreeListAllocator::bytes`].
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` for a handle issued by another allocator.
    pub fn bytes_mut(&mut self, handle: &BlockHandle) -> MemoryResult<&mut [u8]> {
        self.check_owner(handle)?;
        let record = read(&self.block, handle.header);
        Ok(&mut self.block[record.data()..record.end()])
    }

    /// Returns the elements of a typed array.
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` for a handle issued by another allocator.
    pub fn array<T: Pod>(&self, array: &ArrayHandle<T>) -> MemoryResult<&[T]> {
        let bytes = self.bytes(&array.block)?;
        let len = array.count * std::mem::size_of::<T>();
        bytemuck::try_cast_slice(&bytes[array.pad..array.pad + len]).map_err(|_| {
            MemoryError::Corrupted {
                offset: array.block.header,
                reason: "array view is misaligned",
            }
        })
    }

    /// Mutable form of [`FreeListAllocator::array`].
    ///
    /// # Errors
    ///
    /// Returns `ForeignHandle` for a handle issued by another allocator.
    pub fn array_mut<T: Pod>(&mut self, array: &ArrayHandle<T>) -> MemoryResult<&mut [T]> {
        let header = array.block.header;
        let len = array.count * std::mem::size_of::<T>();
        let bytes = self.bytes_mut(&array.block)?;
        bytemuck::try_cast_slice_mut(&mut bytes[array.pad..array.pad + len]).map_err(|_| {
            MemoryError::Corrupted {
                offset: header,
                reason: "array view is misaligned",
            }
        })
    }

    /// Finds the best-fitting free gap for `requested` bytes.
    ///
    /// Returns the header offset of the gap's predecessor in the free list,
    /// the gap's own header offset, and its header.
    fn best_fit(&self, requested: usize) -> Option<(Option<usize>, usize, RecordHeader)> {
        let mut best: Option<(Option<usize>, usize, RecordHeader)> = None;
        let mut prev = None;

        for (at, gap) in self.records(List::Free) {
            if gap.len() >= requested {
                let waste = gap.len() - requested;
                // Strictly smaller waste only: ties keep the lower address.
                let better = best
                    .as_ref()
                    .map_or(true, |(_, _, current)| waste < current.len() - requested);
                if better {
                    best = Some((prev, at, gap));
                }
            }
            prev = Some(at);
        }

        best
    }

    /// Returns the neighbors `at` would sit between in `list`.
    fn find_slot(&self, list: List, at: usize) -> (Option<usize>, Option<usize>) {
        let mut prev = None;
        for (current, _) in self.records(list) {
            if at < current {
                return (prev, Some(current));
            }
            prev = Some(current);
        }
        (prev, None)
    }

    /// Finds the record at `at` in `list`, with its predecessor.
    fn find_record(&self, list: List, at: usize) -> MemoryResult<(Option<usize>, RecordHeader)> {
        let mut prev = None;
        for (current, record) in self.records(list) {
            if current == at {
                return Ok((prev, record));
            }
            if current > at {
                break;
            }
            prev = Some(current);
        }
        Err(MemoryError::UnknownBlock(at))
    }

    /// Points `prev`'s `next` (or the list head) at `next`.
    fn link_after(&mut self, list: List, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(prev_at) => {
                let mut record = read(&self.block, prev_at);
                record.set_next(next);
                write(&mut self.block, prev_at, &record);
            }
            None => match list {
                List::Allocated => self.alloc_head = next,
                List::Free => self.free_head = next,
            },
        }
    }

    /// Iterates the records of `list` in address order.
    fn records(&self, list: List) -> Records<'_> {
        Records::new(&self.block, self.head(list))
    }

    #[inline]
    const fn head(&self, list: List) -> Option<usize> {
        match list {
            List::Allocated => self.alloc_head,
            List::Free => self.free_head,
        }
    }

    #[inline]
    fn check_owner(&self, handle: &BlockHandle) -> MemoryResult<()> {
        if handle.owner == self.id {
            Ok(())
        } else {
            Err(MemoryError::ForeignHandle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap_sizes(allocator: &FreeListAllocator) -> Vec<usize> {
        allocator.free_gaps().map(|span| span.len).collect()
    }

    #[test]
    fn test_create_single_gap() {
        let allocator = FreeListAllocator::with_capacity(1024);
        assert_eq!(gap_sizes(&allocator), vec![1024 - HEADER_SIZE]);
        assert_eq!(allocator.allocations().count(), 0);
        allocator.verify().unwrap();
    }

    #[test]
    fn test_create_too_small() {
        let err = FreeListAllocator::try_new(vec![0u8; HEADER_SIZE].into_boxed_slice());
        assert_eq!(
            err.err(),
            Some(MemoryError::BlockTooSmall {
                size: HEADER_SIZE,
                minimum: HEADER_SIZE,
            })
        );
        assert!(FreeListAllocator::try_new(vec![0u8; HEADER_SIZE + 1].into_boxed_slice()).is_ok());
    }

    #[test]
    #[should_panic(expected = "way too small")]
    fn test_create_too_small_is_fatal() {
        let _ = FreeListAllocator::with_capacity(8);
    }

    #[test]
    fn test_alloc_splits_gap() {
        let mut allocator = FreeListAllocator::with_capacity(1024);
        let a = allocator.alloc(100).unwrap();

        assert_eq!(a.offset(), HEADER_SIZE);
        assert_eq!(allocator.bytes(&a).unwrap().len(), 100);
        assert_eq!(gap_sizes(&allocator), vec![1024 - 100 - 2 * HEADER_SIZE]);
        allocator.verify().unwrap();
    }

    #[test]
    fn test_alloc_absorbs_small_remainder() {
        let mut allocator = FreeListAllocator::with_capacity(1024);
        let whole = 1024 - HEADER_SIZE;

        // A remainder equal to one header cannot host a gap of its own.
        let a = allocator.alloc(whole - HEADER_SIZE).unwrap();
        assert_eq!(allocator.bytes(&a).unwrap().len(), whole);
        assert_eq!(allocator.free_gaps().count(), 0);
        allocator.verify().unwrap();
    }

    #[test]
    fn test_alloc_zeroes_reused_memory() {
        let mut allocator = FreeListAllocator::with_capacity(512);
        let a = allocator.alloc(64).unwrap();
        allocator.bytes_mut(&a).unwrap().fill(0xFF);
        allocator.free(a).unwrap();

        let b = allocator.alloc(64).unwrap();
        assert!(allocator.bytes(&b).unwrap().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn test_best_fit_picks_smallest_adequate_gap() {
        // Carve gaps of 40, 100 and 25 bytes separated by live blocks.
        let mut allocator = FreeListAllocator::with_capacity(4096);
        let g40 = allocator.alloc(40).unwrap();
        let _s1 = allocator.alloc(8).unwrap();
        let g100 = allocator.alloc(100).unwrap();
        let _s2 = allocator.alloc(8).unwrap();
        let g25 = allocator.alloc(25).unwrap();
        let _s3 = allocator.alloc(8).unwrap();
        let rest = allocator.alloc(4096 - 7 * HEADER_SIZE - 40 - 100 - 25 - 24).unwrap();
        assert_eq!(allocator.free_gaps().count(), 0);

        let g25_offset = g25.offset();
        allocator.free(g40).unwrap();
        allocator.free(g100).unwrap();
        allocator.free(g25).unwrap();
        assert_eq!(gap_sizes(&allocator), vec![40, 100, 25]);

        let c = allocator.alloc(20).unwrap();
        assert_eq!(c.offset(), g25_offset);
        // 25 - 20 leaves less than a header, so the whole gap is used.
        assert_eq!(allocator.bytes(&c).unwrap().len(), 25);
        assert_eq!(gap_sizes(&allocator), vec![40, 100]);

        allocator.free(rest).unwrap();
        allocator.verify().unwrap();
    }

    #[test]
    fn test_best_fit_ties_take_lowest_address() {
        let mut allocator = FreeListAllocator::with_capacity(2048);
        let a = allocator.alloc(64).unwrap();
        let _s1 = allocator.alloc(8).unwrap();
        let b = allocator.alloc(64).unwrap();
        let _s2 = allocator.alloc(8).unwrap();

        let a_offset = a.offset();
        allocator.free(b).unwrap();
        allocator.free(a).unwrap();

        let c = allocator.alloc(64).unwrap();
        assert_eq!(c.offset(), a_offset);
    }

    #[test]
    fn test_round_trip_reuses_and_coalesces() {
        let mut allocator = FreeListAllocator::with_capacity(1024);
        let a = allocator.alloc(100).unwrap();
        let b = allocator.alloc(200).unwrap();

        let a_offset = a.offset();
        allocator.free(a).unwrap();

        let c = allocator.alloc(90).unwrap();
        assert_eq!(c.offset(), a_offset);
        // 100 - 90 is below a header: the whole reclaimed range is reused.
        assert_eq!(allocator.bytes(&c).unwrap().len(), 100);

        allocator.free(b).unwrap();
        allocator.free(c).unwrap();
        assert_eq!(gap_sizes(&allocator), vec![1024 - HEADER_SIZE]);
        allocator.verify().unwrap();
    }

    #[test]
    fn test_free_merges_both_neighbors() {
        let mut allocator = FreeListAllocator::with_capacity(1024);
        let a = allocator.alloc(50).unwrap();
        let b = allocator.alloc(60).unwrap();
        let c = allocator.alloc(70).unwrap();
        let _d = allocator.alloc(80).unwrap();

        allocator.free(a).unwrap();
        allocator.free(c).unwrap();
        assert_eq!(allocator.free_gaps().count(), 3);

        allocator.free(b).unwrap();
        assert_eq!(
            gap_sizes(&allocator)[0],
            50 + 60 + 70 + 2 * HEADER_SIZE
        );
        assert_eq!(allocator.free_gaps().count(), 2);
        allocator.verify().unwrap();
    }

    #[test]
    fn test_out_of_memory_leaves_state_untouched() {
        let mut allocator = FreeListAllocator::with_capacity(256);
        let a = allocator.alloc(100).unwrap();
        let before = allocator.stats();

        let err = allocator.alloc(200).unwrap_err();
        assert_eq!(
            err,
            MemoryError::OutOfMemory {
                requested: 200,
                largest_gap: 256 - 100 - 2 * HEADER_SIZE,
            }
        );
        assert_eq!(allocator.stats(), before);
        allocator.free(a).unwrap();
        allocator.verify().unwrap();
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let mut first = FreeListAllocator::with_capacity(256);
        let mut second = FreeListAllocator::with_capacity(256);
        let handle = first.alloc(16).unwrap();

        assert_eq!(second.bytes(&handle).unwrap_err(), MemoryError::ForeignHandle);
        assert_eq!(second.free(handle).unwrap_err(), MemoryError::ForeignHandle);
        second.verify().unwrap();
        assert_eq!(first.allocations().count(), 1);
    }

    #[test]
    fn test_free_none_is_noop() {
        let mut allocator = FreeListAllocator::with_capacity(256);
        let before = allocator.stats();
        allocator.free_opt(None).unwrap();
        assert_eq!(allocator.stats(), before);

        let a = allocator.alloc(10).unwrap();
        allocator.free_opt(Some(a)).unwrap();
        assert_eq!(allocator.stats(), before);
    }

    #[test]
    fn test_zero_sized_request() {
        let mut allocator = FreeListAllocator::with_capacity(256);
        let a = allocator.alloc(0).unwrap();
        assert!(allocator.bytes(&a).unwrap().is_empty());
        allocator.verify().unwrap();
        allocator.free(a).unwrap();
        assert_eq!(gap_sizes(&allocator), vec![256 - HEADER_SIZE]);
    }

    #[test]
    fn test_alloc_array_aligned_and_zeroed() {
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        #[repr(C)]
        struct Vec2 {
            x: f32,
            y: f32,
        }

        let mut allocator = FreeListAllocator::with_capacity(4096);
        let _odd = allocator.alloc(3).unwrap();
        let points = allocator.alloc_array::<Vec2>(16).unwrap();
        assert_eq!(points.count(), 16);
        let first = allocator.array(&points).unwrap().as_ptr() as usize;
        assert_eq!(first % std::mem::align_of::<Vec2>(), 0);

        let view = allocator.array_mut(&points).unwrap();
        assert!(view.iter().all(|p| *p == Vec2 { x: 0.0, y: 0.0 }));
        view[15] = Vec2 { x: 1.0, y: 2.0 };
        assert_eq!(allocator.array(&points).unwrap()[15].y, 2.0);

        allocator.free_array(points).unwrap();
        allocator.verify().unwrap();
    }

    #[test]
    fn test_alloc_array_errors() {
        let mut allocator = FreeListAllocator::with_capacity(256);
        assert_eq!(
            allocator.alloc_array::<()>(1).unwrap_err(),
            MemoryError::ZeroSizedType
        );
        assert_eq!(
            allocator.alloc_array::<u64>(usize::MAX).unwrap_err(),
            MemoryError::SizeOverflow
        );
    }
}
