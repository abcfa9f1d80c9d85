//! Collector-backed strategy
//!
//! Owns a conservatively collected [`Heap`]. The heap is created by
//! `initialize`, or on the first allocation if the host never calls
//! it.

use std::sync::OnceLock;

use super::{
    alloc::{MemoryBlock, ObjectKind},
    collect::CollectionReport,
    heap::{Heap, HeapError},
    roots::RootRange,
    settings::AllocSettings,
    strategy::{AllocationStats, AllocationStrategy, StrategyKind},
};

#[derive(Debug, Default)]
pub struct CollectorBacked {
    heap: OnceLock<Heap>,
    limit: Option<usize>,
    trace: bool,
    /// Collect inside an allocation that runs out of space
    pressure: bool,
}

impl CollectorBacked {
    pub fn new() -> Self {
        CollectorBacked::default()
    }

    /// Collector whose heap may not commit more than `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        CollectorBacked {
            limit: Some(limit),
            ..CollectorBacked::default()
        }
    }

    pub fn from_settings(settings: &AllocSettings) -> Self {
        CollectorBacked {
            heap: OnceLock::new(),
            limit: settings.heap_limit_bytes(),
            trace: settings.gc_trace,
            pressure: settings.gc_on_pressure,
        }
    }

    /// Let a full heap collect and retry instead of failing at once.
    /// Everything the host holds must then be reachable from
    /// registered roots.
    pub fn collecting_on_pressure(mut self) -> Self {
        self.pressure = true;
        self
    }

    /// The heap, bootstrapping it if necessary
    pub fn heap(&self) -> &Heap {
        self.heap.get_or_init(|| {
            if self.trace {
                eprintln!("Initialising collector heap (limit: {:?})", self.limit);
            }
            let heap = match self.limit {
                Some(limit) => Heap::with_limit(limit),
                None => Heap::new(),
            };
            heap.traced(self.trace).collecting_on_pressure(self.pressure)
        })
    }

    fn allocate_kind(&self, size: usize, kind: ObjectKind) -> Option<MemoryBlock> {
        match self.try_allocate(size, kind) {
            Ok(block) => Some(block),
            Err(e) => {
                if self.trace {
                    eprintln!("{}", e);
                }
                None
            }
        }
    }

    /// Allocate, reporting why on failure
    pub fn try_allocate(&self, size: usize, kind: ObjectKind) -> Result<MemoryBlock, HeapError> {
        let ptr = self.heap().alloc_bytes(size, kind)?;
        let len = Heap::payload_size_for(size)?;
        Ok(MemoryBlock::new(ptr, len, kind))
    }
}

impl AllocationStrategy for CollectorBacked {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Collector
    }

    fn initialize(&self) {
        self.heap();
    }

    fn is_initialized(&self) -> bool {
        self.heap.get().is_some()
    }

    fn allocate(&self, size: usize) -> Option<MemoryBlock> {
        self.allocate_kind(size, ObjectKind::Traced)
    }

    fn allocate_atomic(&self, size: usize) -> Option<MemoryBlock> {
        self.allocate_kind(size, ObjectKind::Atomic)
    }

    fn stats(&self) -> AllocationStats {
        match self.heap.get() {
            Some(heap) => {
                let counters = heap.counters();
                AllocationStats {
                    allocations: counters.objects_allocated,
                    atomic_allocations: counters.atomic_objects_allocated,
                    bytes_allocated: counters.bytes_allocated,
                    failures: counters.failed_allocations,
                    collections: counters.collections,
                    bytes_reclaimed: counters.bytes_freed,
                    bytes_committed: heap.stats().bytes_committed as u64,
                }
            }
            None => AllocationStats::default(),
        }
    }

    fn collect(&self) -> Option<CollectionReport> {
        Some(self.heap().collect())
    }

    unsafe fn register_roots(&self, range: RootRange) {
        self.heap().add_roots(range)
    }

    fn unregister_roots(&self, start: usize) -> bool {
        self.heap().remove_roots(start)
    }
}
