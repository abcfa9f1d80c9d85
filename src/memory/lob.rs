//! Large objects
//!
//! Objects too big for a bump block get an upstream allocation of
//! their own, holding just the header and payload.

use std::alloc::{alloc, dealloc, Layout};
use std::ops::Range;
use std::ptr::NonNull;

use super::bump::AllocError;

const KB: usize = 1024;
const MB: usize = 1024 * KB;

/// (largest request, rounding granule) in ascending order; requests
/// beyond the last bound use `LAST_GRANULE`
const GRANULES: [(usize, usize); 2] = [(128 * KB, 16 * KB), (MB, 64 * KB)];
const LAST_GRANULE: usize = 256 * KB;

/// Upstream allocation owned by a single large object
#[derive(Debug)]
pub struct LargeObjectBlock {
    ptr: NonNull<u8>,
    /// Bytes actually obtained, never less than requested
    size: usize,
}

unsafe impl Send for LargeObjectBlock {}

impl LargeObjectBlock {
    pub fn new(required_size: usize) -> Result<Self, AllocError> {
        let size = Self::efficient_size_for(required_size);
        let layout = Self::layout_for(size)?;

        // SAFETY: size is at least one granule so layout is non-zero
        let ptr = NonNull::new(unsafe { alloc(layout) }).ok_or(AllocError::OOM)?;
        if cfg!(debug_assertions) {
            unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xff, size) };
        }

        Ok(LargeObjectBlock { ptr, size })
    }

    /// Page aligned for anything page sized or more
    fn layout_for(size: usize) -> Result<Layout, AllocError> {
        let align = size.next_power_of_two().clamp(16, 4096);
        Layout::from_size_align(size, align).map_err(|_| AllocError::BadRequest)
    }

    /// Bytes to request upstream for `required_size`: rounded up to a
    /// granule that grows with the request so that waste stays small
    /// relative to the object
    pub fn efficient_size_for(required_size: usize) -> usize {
        let granule = GRANULES
            .iter()
            .find(|(bound, _)| required_size <= *bound)
            .map_or(LAST_GRANULE, |(_, granule)| *granule);

        required_size.max(1).div_ceil(granule) * granule
    }

    /// Where the header goes
    pub fn space(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn allocated_size(&self) -> usize {
        self.size
    }

    /// Address range of the whole allocation
    pub fn span(&self) -> Range<usize> {
        let base = self.ptr.as_ptr() as usize;
        base..base + self.size
    }
}

impl Drop for LargeObjectBlock {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with the layout for this size
        if let Ok(layout) = Self::layout_for(self.size) {
            unsafe { dealloc(self.ptr.as_ptr(), layout) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_requests_round_to_16k() {
        for (required, expected) in [
            (1, 16),
            (16 * KB, 16),
            (33 * KB, 48),
            (65 * KB, 80),
            (128 * KB, 128),
        ] {
            assert_eq!(
                LargeObjectBlock::efficient_size_for(required),
                expected * KB,
                "rounding {} bytes",
                required
            );
        }
    }

    #[test]
    fn test_medium_requests_round_to_64k() {
        assert_eq!(LargeObjectBlock::efficient_size_for(129 * KB), 192 * KB);
        assert_eq!(LargeObjectBlock::efficient_size_for(900 * KB), 960 * KB);
        assert_eq!(LargeObjectBlock::efficient_size_for(MB), MB);
    }

    #[test]
    fn test_huge_requests_round_to_256k() {
        assert_eq!(LargeObjectBlock::efficient_size_for(MB + KB), 1280 * KB);
        assert_eq!(LargeObjectBlock::efficient_size_for(1500 * KB), 1536 * KB);
        assert_eq!(LargeObjectBlock::efficient_size_for(2 * MB), 2 * MB);
    }

    #[test]
    fn test_span_covers_rounded_size() {
        let lob = LargeObjectBlock::new(50 * KB).unwrap();
        let span = lob.span();

        assert_eq!(span.len(), 64 * KB);
        assert_eq!(span.start, lob.space() as usize);
        assert_eq!(lob.allocated_size(), 64 * KB);
    }

    #[test]
    fn test_space_is_aligned_for_headers() {
        let lob = LargeObjectBlock::new(40 * KB).unwrap();
        assert_eq!(lob.space() as usize % 16, 0);
    }
}
