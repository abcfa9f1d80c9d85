//! Header for all heap objects
//!
//! Records collector state for an allocation and whether the payload
//! may hold references at all.

use bitmaps::Bitmap;

use super::alloc::ObjectKind;

#[derive(Debug)]
pub struct HeaderBits(Bitmap<2>);

const MARK_BIT: usize = 0;
const ATOMIC_BIT: usize = 1;

impl HeaderBits {
    /// Bits for a fresh, unmarked object given the heap's current mark
    /// state (which flips on each collection)
    fn new(kind: ObjectKind, mark_state: bool) -> HeaderBits {
        let mut bits = HeaderBits(Bitmap::default());
        bits.unmark(mark_state);
        bits.0.set(ATOMIC_BIT, kind == ObjectKind::Atomic);
        bits
    }

    fn mark(&mut self, mark_state: bool) {
        self.0.set(MARK_BIT, mark_state);
    }

    fn unmark(&mut self, mark_state: bool) {
        self.0.set(MARK_BIT, !mark_state);
    }

    fn is_marked(&self, mark_state: bool) -> bool {
        self.0.get(MARK_BIT) == mark_state
    }

    fn is_atomic(&self) -> bool {
        self.0.get(ATOMIC_BIT)
    }
}

/// Object Header
///
/// Sits immediately before the payload. Kept at 16 bytes so that
/// payloads share the alignment of the header.
#[repr(C, align(16))]
#[derive(Debug)]
pub struct AllocHeader {
    /// Header bits for object state
    bits: HeaderBits,
    /// Count of allocated payload bytes
    alloc_length: u32,
}

impl AllocHeader {
    pub fn new(kind: ObjectKind, byte_length: u32, mark_state: bool) -> Self {
        AllocHeader {
            bits: HeaderBits::new(kind, mark_state),
            alloc_length: byte_length,
        }
    }

    pub fn mark(&mut self, mark_state: bool) {
        self.bits.mark(mark_state)
    }

    pub fn is_marked(&self, mark_state: bool) -> bool {
        self.bits.is_marked(mark_state)
    }

    pub fn kind(&self) -> ObjectKind {
        if self.bits.is_atomic() {
            ObjectKind::Atomic
        } else {
            ObjectKind::Traced
        }
    }

    /// Payload bytes
    pub fn length(&self) -> u32 {
        self.alloc_length
    }
}
