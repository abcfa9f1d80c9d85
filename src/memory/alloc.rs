//! What allocation hands back to the runtime

use std::ops::Range;
use std::ptr::NonNull;

/// Whether a block may hold references to other heap blocks
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// May contain pointers; scanned by a collector
    Traced,
    /// Pointer free; never scanned
    Atomic,
}

/// An opaque span of memory returned by an allocation strategy.
///
/// A `MemoryBlock` does not own its memory. Reclamation is the
/// business of the strategy that produced it: a collector reclaims
/// it once unreachable, the raw heap never does.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryBlock {
    ptr: NonNull<u8>,
    len: usize,
    kind: ObjectKind,
}

// The block is an address and a length; access discipline is the
// caller's, exactly as for a pointer returned from malloc.
unsafe impl Send for MemoryBlock {}
unsafe impl Sync for MemoryBlock {}

impl MemoryBlock {
    pub fn new(ptr: NonNull<u8>, len: usize, kind: ObjectKind) -> Self {
        MemoryBlock { ptr, len, kind }
    }

    /// Start of the block
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Addressable length in bytes, at least the size requested
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn is_atomic(&self) -> bool {
        self.kind == ObjectKind::Atomic
    }

    /// Address range covered by the block
    pub fn address_range(&self) -> Range<usize> {
        let start = self.ptr.as_ptr() as usize;
        start..start + self.len
    }

    /// Whether two blocks share any byte
    pub fn overlaps(&self, other: &MemoryBlock) -> bool {
        let a = self.address_range();
        let b = other.address_range();
        a.start < b.end && b.start < a.end
    }

    /// View the block as a mutable byte slice
    ///
    /// # Safety
    ///
    /// The block must still be live under its strategy and no other
    /// reference to its bytes may be active for `'a`.
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}
