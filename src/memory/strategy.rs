//! Allocation strategies
//!
//! The runtime allocates through exactly one strategy per process. A
//! strategy is picked once, from settings, and never changes.

use std::fmt::{Debug, Display};
use std::str::FromStr;

use thiserror::Error;

use super::{
    alloc::MemoryBlock, collect::CollectionReport, collector::CollectorBacked, raw::RawHeap,
    roots::RootRange, settings::AllocSettings,
};

/// Which mechanism backs allocation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Conservative garbage collector
    Collector,
    /// System allocator, never reclaimed
    RawHeap,
}

impl Default for StrategyKind {
    fn default() -> Self {
        if cfg!(feature = "collector") {
            StrategyKind::Collector
        } else {
            StrategyKind::RawHeap
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown allocation strategy '{0}' (expected collector, gc, raw, raw-heap or malloc)")]
pub struct StrategyParseError(pub String);

impl FromStr for StrategyKind {
    type Err = StrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collector" | "gc" => Ok(StrategyKind::Collector),
            "raw" | "raw-heap" | "malloc" => Ok(StrategyKind::RawHeap),
            _ => Err(StrategyParseError(s.to_string())),
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Collector => write!(f, "collector"),
            StrategyKind::RawHeap => write!(f, "raw-heap"),
        }
    }
}

/// Counters kept by every strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub allocations: u64,
    pub atomic_allocations: u64,
    pub bytes_allocated: u64,
    pub failures: u64,
    pub collections: u64,
    pub bytes_reclaimed: u64,
    pub bytes_committed: u64,
}

/// A backing mechanism for runtime allocation
///
/// Both allocation entry points fail by returning `None` and must not
/// panic. A returned block is at least `size` bytes long, including
/// for `size == 0`.
pub trait AllocationStrategy: Send + Sync + Debug {
    fn kind(&self) -> StrategyKind;

    /// One-time setup. Must be idempotent.
    fn initialize(&self);

    fn is_initialized(&self) -> bool;

    /// Block that may hold references to other blocks
    fn allocate(&self, size: usize) -> Option<MemoryBlock>;

    /// Block the caller promises never to store references in
    fn allocate_atomic(&self, size: usize) -> Option<MemoryBlock>;

    fn stats(&self) -> AllocationStats;

    /// Run a collection, if this strategy collects at all
    fn collect(&self) -> Option<CollectionReport> {
        None
    }

    /// Make a range of host memory visible to the collector as roots
    ///
    /// # Safety
    ///
    /// The range must stay readable until unregistered.
    unsafe fn register_roots(&self, _range: RootRange) {}

    /// Forget the root range starting at `start`
    fn unregister_roots(&self, _start: usize) -> bool {
        false
    }
}

/// Build the strategy the settings ask for
pub fn from_settings(settings: &AllocSettings) -> Box<dyn AllocationStrategy> {
    match settings.strategy {
        StrategyKind::Collector => Box::new(CollectorBacked::from_settings(settings)),
        StrategyKind::RawHeap => Box::new(RawHeap::from_settings(settings)),
    }
}
