//! Downward bump allocation within a block, guided by a line map
//!
//! A block is carved into 128 byte lines. After a collection the
//! lines touched by live objects are marked and allocation resumes in
//! the runs of unmarked lines ("holes") between them, highest first.

use std::{fmt::Debug, ptr::NonNull};

use bitmaps::Bitmap;
use thiserror::Error;

use super::block::{Block, BlockError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("bad allocation request")]
    BadRequest,
    #[error("out of memory")]
    OOM,
}

impl From<BlockError> for AllocError {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::BadSize => AllocError::BadRequest,
            BlockError::OOM => AllocError::OOM,
        }
    }
}

/// 32K Block
pub const BLOCK_SIZE_BITS: usize = 15;
/// 32K Block
pub const BLOCK_SIZE_BYTES: usize = 1 << BLOCK_SIZE_BITS;

/// 128 byte line
pub const LINE_SIZE_BITS: usize = 7;
/// 128 byte line
pub const LINE_SIZE_BYTES: usize = 1 << LINE_SIZE_BITS;
/// Lines in a block
pub const LINE_COUNT: usize = BLOCK_SIZE_BYTES / LINE_SIZE_BYTES;

/// Largest payload an object header can describe
pub const MAX_ALLOC_SIZE: usize = u32::MAX as usize;

/// Line occupancy of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    /// Runs of unmarked lines
    pub holes: usize,
    pub free: usize,
    pub marked: usize,
}

/// One mark flag per line of a block
#[derive(Default)]
pub struct LineMap(Bitmap<LINE_COUNT>);

impl LineMap {
    pub fn mark(&mut self, index: usize) {
        debug_assert!(index < LINE_COUNT);
        self.0.set(index, true);
    }

    pub fn marked(&self, index: usize) -> bool {
        debug_assert!(index < LINE_COUNT);
        self.0.get(index)
    }

    /// Unmark every line
    pub fn reset(&mut self) {
        self.0 = Bitmap::new();
    }

    /// Find the highest hole lying entirely below `below_offset`,
    /// returned as block byte offsets `(lower, upper)`.
    ///
    /// A small object may run over the end of the line its header
    /// starts in, so the topmost line of every unmarked run is treated
    /// as occupied and a run needs at least two lines to count.
    pub fn find_hole(&self, below_offset: usize) -> Option<(usize, usize)> {
        let mut line = below_offset / LINE_SIZE_BYTES;

        while line > 0 {
            while line > 0 && self.marked(line - 1) {
                line -= 1;
            }

            let top = line;
            while line > 0 && !self.marked(line - 1) {
                line -= 1;
            }

            if top - line > 1 {
                return Some((line * LINE_SIZE_BYTES, (top - 1) * LINE_SIZE_BYTES));
            }
        }

        None
    }

    pub fn stats(&self) -> LineStats {
        let marked = self.0.len();
        let holes = (0..LINE_COUNT)
            .filter(|&line| !self.marked(line) && (line == 0 || self.marked(line - 1)))
            .count();

        LineStats {
            holes,
            free: LINE_COUNT - marked,
            marked,
        }
    }
}

/// Dumped as two rows of two 64-line words, lowest line leftmost
impl Debug for LineMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: [u128; 2] = self.0.into();
        for row in rows {
            let (left, right) = (row as u64, (row >> 64) as u64);
            writeln!(
                f,
                "{:#018x} {:#018x}",
                left.reverse_bits(),
                right.reverse_bits()
            )?;
        }
        Ok(())
    }
}

/// A block that hands out space from the top of its current hole
/// downwards
pub struct BumpBlock {
    block: Block,
    /// Bottom of the current hole
    floor: usize,
    /// Next allocation ends here
    cursor: usize,
    line_map: LineMap,
}

impl PartialEq for BumpBlock {
    fn eq(&self, other: &Self) -> bool {
        self.block.as_ptr() == other.block.as_ptr()
    }
}

impl Eq for BumpBlock {}

impl Debug for BumpBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:p} hole [{}, {}) of {}",
            self.block.as_ptr(),
            self.floor,
            self.cursor,
            self.block.size()
        )?;
        write!(f, "{:?}", self.line_map)
    }
}

impl BumpBlock {
    /// A fresh block whose single hole is the whole block
    pub fn new() -> Result<Self, AllocError> {
        Ok(BumpBlock {
            block: Block::new(BLOCK_SIZE_BYTES)?,
            floor: 0,
            cursor: BLOCK_SIZE_BYTES,
            line_map: LineMap::default(),
        })
    }

    /// Take `size` bytes from the current hole, moving down to lower
    /// holes until one fits
    pub fn bump(&mut self, size: usize) -> Option<*const u8> {
        loop {
            if let Some(next) = self.cursor.checked_sub(size).filter(|n| *n >= self.floor) {
                self.cursor = next;
                // SAFETY: next + size <= BLOCK_SIZE_BYTES
                return Some(unsafe { self.block.as_ptr().add(next) });
            }

            let (floor, cursor) = self.line_map.find_hole(self.floor)?;
            if cfg!(debug_assertions) {
                self.block.fill(floor, cursor - floor);
            }
            self.floor = floor;
            self.cursor = cursor;
        }
    }

    /// Restart allocation from the highest hole the line marks leave.
    /// Returns false when the block has no hole at all.
    pub fn recycle(&mut self) -> bool {
        let (floor, cursor) = self
            .line_map
            .find_hole(BLOCK_SIZE_BYTES)
            .unwrap_or((0, 0));
        self.floor = floor;
        self.cursor = cursor;
        cursor > floor
    }

    pub fn current_hole_size(&self) -> usize {
        self.cursor - self.floor
    }

    pub fn base(&self) -> usize {
        self.block.base()
    }

    pub fn reset_region_marks(&mut self) {
        self.line_map.reset();
    }

    /// Mark every line overlapped by `bytes` bytes at `ptr`; does
    /// nothing if `ptr` lies in another block
    pub fn mark_region(&mut self, ptr: NonNull<u8>, bytes: usize) {
        let Some(offset) = self.block.byte_offset_of(ptr) else {
            return;
        };

        let end = (offset + bytes.max(1)).min(BLOCK_SIZE_BYTES);
        for line in (offset / LINE_SIZE_BYTES)..=((end - 1) / LINE_SIZE_BYTES) {
            self.line_map.mark(line);
        }
    }

    pub fn stats(&self) -> LineStats {
        self.line_map.stats()
    }
}
