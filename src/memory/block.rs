//! Blocks of memory acquired from the upstream allocator
//!
//! Heavily based on https://rust-hosted-langs.github.io/

use std::alloc::{alloc, dealloc, Layout};
use std::ptr::NonNull;

use thiserror::Error;

/// A block of memory allocated by the OS / upstream allocator,
/// aligned to its own (power of two) size
#[derive(Debug, PartialEq)]
pub struct Block {
    /// Pointer to memory
    ptr: NonNull<u8>,
    /// Size of block
    size: usize,
}

// Blocks are plain memory owned by exactly one heap
unsafe impl Send for Block {}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("block size must be a power of two")]
    BadSize,
    #[error("upstream allocator could not supply block")]
    OOM,
}

impl Block {
    pub fn new(size: usize) -> Result<Self, BlockError> {
        if !size.is_power_of_two() {
            Err(BlockError::BadSize)
        } else {
            Ok(Block {
                ptr: Self::alloc_block(size)?,
                size,
            })
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Address of the first byte of the block
    pub fn base(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Whether the address falls inside this block
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.base() && addr < self.base() + self.size
    }

    /// Offset of a pointer within the block if the block contains it
    pub fn byte_offset_of<T>(&self, ptr: NonNull<T>) -> Option<usize> {
        let addr = ptr.as_ptr() as usize;
        if self.contains(addr) {
            Some(addr - self.base())
        } else {
            None
        }
    }

    /// Fill a region of the block with a debug pattern
    pub fn fill(&mut self, offset: usize, len: usize) {
        debug_assert!(offset + len <= self.size);
        unsafe {
            std::ptr::write_bytes(self.ptr.as_ptr().add(offset), 0xff, len);
        }
    }

    fn alloc_block(size: usize) -> Result<NonNull<u8>, BlockError> {
        let layout = Layout::from_size_align(size, size).map_err(|_| BlockError::BadSize)?;
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or(BlockError::OOM)
    }

    fn dealloc_block(ptr: NonNull<u8>, size: usize) {
        unsafe { dealloc(ptr.as_ptr(), Layout::from_size_align_unchecked(size, size)) }
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        Self::dealloc_block(self.ptr, self.size);
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_bad_sizealign() {
        assert_eq!(Block::new(999), Err(BlockError::BadSize))
    }

    #[test]
    fn test_32k() {
        let block = Block::new(0x8000).unwrap();

        let mask = 0x7fff;
        let loc = block.ptr.as_ptr() as usize;
        assert!((loc & mask) ^ mask == mask);

        drop(block);
    }

    #[test]
    fn test_contains_and_offset() {
        let block = Block::new(0x8000).unwrap();
        let base = block.base();

        assert!(block.contains(base));
        assert!(block.contains(base + 0x7fff));
        assert!(!block.contains(base + 0x8000));

        let inner = NonNull::new((base + 0x100) as *mut u8).unwrap();
        assert_eq!(block.byte_offset_of(inner), Some(0x100));

        let outer = NonNull::new((base + 0x8000) as *mut u8).unwrap();
        assert_eq!(block.byte_offset_of(outer), None);
    }
}
