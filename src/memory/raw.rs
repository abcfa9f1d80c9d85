//! Raw heap strategy
//!
//! Blocks come straight from the system allocator and are never given
//! back: the runtime has no free operation, so they live until the
//! process exits.

use std::alloc::{alloc, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{
    alloc::{MemoryBlock, ObjectKind},
    settings::AllocSettings,
    strategy::{AllocationStats, AllocationStrategy, StrategyKind},
};

/// Alignment of every raw block, enough for any scalar the runtime
/// stores
pub const RAW_ALIGN: usize = 16;

/// Smallest block handed out, so zero sized requests still succeed
pub const RAW_MIN_SIZE: usize = 16;

/// System allocator backed strategy. Safe for concurrent callers.
#[derive(Debug, Default)]
pub struct RawHeap {
    /// Simulated exhaustion point in bytes
    limit: Option<usize>,
    committed: AtomicUsize,
    allocations: AtomicU64,
    atomic_allocations: AtomicU64,
    failures: AtomicU64,
}

impl RawHeap {
    pub fn new() -> Self {
        RawHeap::default()
    }

    /// Raw heap that refuses to hand out more than `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        RawHeap {
            limit: Some(limit),
            ..RawHeap::default()
        }
    }

    pub fn from_settings(settings: &AllocSettings) -> Self {
        match settings.heap_limit_bytes() {
            Some(limit) => RawHeap::with_limit(limit),
            None => RawHeap::new(),
        }
    }

    /// Reserve `size` bytes against the limit
    fn reserve(&self, size: usize) -> bool {
        match self.limit {
            None => {
                self.committed.fetch_add(size, Ordering::Relaxed);
                true
            }
            Some(limit) => self
                .committed
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    current.checked_add(size).filter(|total| *total <= limit)
                })
                .is_ok(),
        }
    }

    fn release(&self, size: usize) {
        self.committed.fetch_sub(size, Ordering::AcqRel);
    }

    fn allocate_kind(&self, size: usize, kind: ObjectKind) -> Option<MemoryBlock> {
        let block = self.try_allocate(size, kind);
        match block {
            Some(_) => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                if kind == ObjectKind::Atomic {
                    self.atomic_allocations.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        block
    }

    fn try_allocate(&self, size: usize, kind: ObjectKind) -> Option<MemoryBlock> {
        let size = size.max(RAW_MIN_SIZE);
        let layout = Layout::from_size_align(size, RAW_ALIGN).ok()?;

        if !self.reserve(size) {
            return None;
        }

        // SAFETY: layout size is at least RAW_MIN_SIZE
        match NonNull::new(unsafe { alloc(layout) }) {
            Some(ptr) => Some(MemoryBlock::new(ptr, size, kind)),
            None => {
                self.release(size);
                None
            }
        }
    }
}

impl AllocationStrategy for RawHeap {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawHeap
    }

    /// Nothing to set up
    fn initialize(&self) {}

    fn is_initialized(&self) -> bool {
        true
    }

    fn allocate(&self, size: usize) -> Option<MemoryBlock> {
        self.allocate_kind(size, ObjectKind::Traced)
    }

    fn allocate_atomic(&self, size: usize) -> Option<MemoryBlock> {
        self.allocate_kind(size, ObjectKind::Atomic)
    }

    fn stats(&self) -> AllocationStats {
        let committed = self.committed.load(Ordering::Acquire) as u64;
        AllocationStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            atomic_allocations: self.atomic_allocations.load(Ordering::Relaxed),
            bytes_allocated: committed,
            failures: self.failures.load(Ordering::Relaxed),
            collections: 0,
            bytes_reclaimed: 0,
            bytes_committed: committed,
        }
    }
}
