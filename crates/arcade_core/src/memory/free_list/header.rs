//! # Record Headers
//!
//! Every byte range the allocator manages starts with one of these. The same
//! header is an allocation record while the block is live and a free-gap
//! record once it is freed; only the list it is linked into changes.
//!
//! ```text
//!   at             at + HEADER_SIZE                 at + HEADER_SIZE + size
//!   | pos | size | next |  usable bytes ...          |
//! ```
//!
//! Headers are `Pod`, so they are read and written straight out of the
//! backing block without any `unsafe`.

use bytemuck::{Pod, Zeroable};

/// Bytes of bookkeeping in front of every allocation and free gap.
pub const HEADER_SIZE: usize = std::mem::size_of::<RecordHeader>();

/// End-of-list marker for `next`.
const NIL: u64 = u64::MAX;

/// Intrusive record header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub(crate) struct RecordHeader {
    /// Offset of the usable bytes (header offset + `HEADER_SIZE`).
    pos: u64,
    /// Number of usable bytes.
    size: u64,
    /// Header offset of the next record in the same list, or `NIL`.
    next: u64,
}

#[inline]
const fn to_u64(value: usize) -> u64 {
    value as u64
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn to_usize(value: u64) -> usize {
    value as usize
}

impl RecordHeader {
    /// Builds the header for a record whose header starts at `at`.
    #[inline]
    pub(crate) const fn new(at: usize, size: usize, next: Option<usize>) -> Self {
        Self {
            pos: to_u64(at + HEADER_SIZE),
            size: to_u64(size),
            next: match next {
                Some(next) => to_u64(next),
                None => NIL,
            },
        }
    }

    /// Offset of the usable bytes.
    #[inline]
    pub(crate) const fn data(&self) -> usize {
        to_usize(self.pos)
    }

    /// Number of usable bytes.
    #[inline]
    pub(crate) const fn len(&self) -> usize {
        to_usize(self.size)
    }

    /// One past the last usable byte.
    #[inline]
    pub(crate) const fn end(&self) -> usize {
        self.data() + self.len()
    }

    /// Header offset of the next record.
    #[inline]
    pub(crate) const fn next(&self) -> Option<usize> {
        if self.next == NIL {
            None
        } else {
            Some(to_usize(self.next))
        }
    }

    #[inline]
    pub(crate) fn set_next(&mut self, next: Option<usize>) {
        self.next = next.map_or(NIL, to_u64);
    }

    /// Absorbs `extra` bytes that directly follow this record.
    #[inline]
    pub(crate) fn grow(&mut self, extra: usize) {
        self.size += to_u64(extra);
    }
}

/// Reads the header at `at`.
///
/// Panics if `at` is out of bounds; the allocator only ever passes offsets
/// it wrote itself.
#[inline]
pub(crate) fn read(block: &[u8], at: usize) -> RecordHeader {
    bytemuck::pod_read_unaligned(&block[at..at + HEADER_SIZE])
}

/// Bounds-checked read used by `verify`.
#[inline]
pub(crate) fn try_read(block: &[u8], at: usize) -> Option<RecordHeader> {
    let end = at.checked_add(HEADER_SIZE)?;
    block.get(at..end).map(bytemuck::pod_read_unaligned)
}

/// Writes `header` at `at`.
#[inline]
pub(crate) fn write(block: &mut [u8], at: usize, header: &RecordHeader) {
    block[at..at + HEADER_SIZE].copy_from_slice(bytemuck::bytes_of(header));
}

/// Walks one intrusive list, yielding `(header offset, header)`.
pub(crate) struct Records<'a> {
    /// Backing block.
    block: &'a [u8],
    /// Next header offset to visit.
    next: Option<usize>,
}

impl<'a> Records<'a> {
    #[inline]
    pub(crate) const fn new(block: &'a [u8], head: Option<usize>) -> Self {
        Self { block, next: head }
    }
}

impl Iterator for Records<'_> {
    type Item = (usize, RecordHeader);

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.next?;
        let header = read(self.block, at);
        self.next = header.next();
        Some((at, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 24);
    }

    #[test]
    fn test_header_in_place() {
        let mut block = vec![0u8; 128];
        let header = RecordHeader::new(40, 32, Some(96));
        write(&mut block, 40, &header);

        let back = read(&block, 40);
        assert_eq!(back, header);
        assert_eq!(back.data(), 64);
        assert_eq!(back.end(), 96);
        assert_eq!(back.next(), Some(96));
    }

    #[test]
    fn test_header_relink_and_grow() {
        let mut header = RecordHeader::new(0, 10, None);
        assert_eq!(header.next(), None);
        header.set_next(Some(50));
        header.grow(HEADER_SIZE + 6);
        assert_eq!(header.len(), 40);
        assert_eq!(header.next(), Some(50));
        header.set_next(None);
        assert_eq!(header.next(), None);
    }

    #[test]
    fn test_try_read_out_of_bounds() {
        let block = vec![0u8; 30];
        assert!(try_read(&block, 0).is_some());
        assert!(try_read(&block, 7).is_none());
        assert!(try_read(&block, usize::MAX).is_none());
    }

    #[test]
    fn test_records_walk() {
        let mut block = vec![0u8; 256];
        write(&mut block, 0, &RecordHeader::new(0, 16, Some(100)));
        write(&mut block, 100, &RecordHeader::new(100, 8, None));

        let offsets: Vec<usize> = Records::new(&block, Some(0)).map(|(at, _)| at).collect();
        assert_eq!(offsets, vec![0, 100]);
        assert_eq!(Records::new(&block, None).count(), 0);
    }
}
