//! The allocation facade
//!
//! Runtime code allocates through a [`Facade`]. Most of it uses the
//! process-wide one via [`allocate`], [`allocate_atomic`] and
//! [`initialize`]; anything that wants a different strategy (tests,
//! embedders) can hold its own.

use std::sync::OnceLock;

use thiserror::Error;

use super::{
    alloc::MemoryBlock,
    settings::AllocSettings,
    strategy::{self, AllocationStats, AllocationStrategy, StrategyKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    #[error("an allocation facade ({0}) is already installed")]
    AlreadyInstalled(StrategyKind),
}

/// Front door to one allocation strategy
#[derive(Debug)]
pub struct Facade {
    strategy: Box<dyn AllocationStrategy>,
}

impl Facade {
    pub fn new(strategy: Box<dyn AllocationStrategy>) -> Self {
        Facade { strategy }
    }

    pub fn from_settings(settings: &AllocSettings) -> Self {
        Facade::new(strategy::from_settings(settings))
    }

    /// Set up the strategy. Safe to call any number of times.
    pub fn initialize(&self) {
        self.strategy.initialize()
    }

    /// At least `size` bytes that may hold references
    pub fn allocate(&self, size: usize) -> Option<MemoryBlock> {
        self.strategy.allocate(size)
    }

    /// At least `size` bytes that must never hold references
    pub fn allocate_atomic(&self, size: usize) -> Option<MemoryBlock> {
        self.strategy.allocate_atomic(size)
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn stats(&self) -> AllocationStats {
        self.strategy.stats()
    }

    pub fn strategy(&self) -> &dyn AllocationStrategy {
        self.strategy.as_ref()
    }
}

impl Default for Facade {
    fn default() -> Self {
        Facade::from_settings(&AllocSettings::default())
    }
}

static ACTIVE: OnceLock<Facade> = OnceLock::new();

/// Install the process-wide facade. Only the first call succeeds.
pub fn install(facade: Facade) -> Result<&'static Facade, FacadeError> {
    let mut candidate = Some(facade);
    let installed = ACTIVE.get_or_init(|| candidate.take().unwrap_or_default());
    match candidate {
        None => Ok(installed),
        Some(_) => Err(FacadeError::AlreadyInstalled(installed.kind())),
    }
}

/// The process-wide facade, installing the default on first use
pub fn active() -> &'static Facade {
    ACTIVE.get_or_init(Facade::default)
}

/// Whether a process-wide facade exists yet
pub fn is_installed() -> bool {
    ACTIVE.get().is_some()
}

pub fn initialize() {
    active().initialize()
}

pub fn allocate(size: usize) -> Option<MemoryBlock> {
    active().allocate(size)
}

pub fn allocate_atomic(size: usize) -> Option<MemoryBlock> {
    active().allocate_atomic(size)
}

#[cfg(test)]
pub mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::memory::alloc::ObjectKind;

    /// Strategy that always fails, recording what was asked of it
    #[derive(Debug, Default)]
    struct Exhausted {
        initialized: AtomicBool,
        requests: AtomicUsize,
    }

    impl AllocationStrategy for Exhausted {
        fn kind(&self) -> StrategyKind {
            StrategyKind::RawHeap
        }

        fn initialize(&self) {
            self.initialized.store(true, Ordering::SeqCst);
        }

        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }

        fn allocate(&self, _size: usize) -> Option<MemoryBlock> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn allocate_atomic(&self, _size: usize) -> Option<MemoryBlock> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn stats(&self) -> AllocationStats {
            AllocationStats {
                failures: self.requests.load(Ordering::SeqCst) as u64,
                ..AllocationStats::default()
            }
        }
    }

    #[test]
    pub fn test_facade_delegates_to_strategy() {
        let facade = Facade::new(Box::<Exhausted>::default());
        assert!(!facade.strategy().is_initialized());
        facade.initialize();
        assert!(facade.strategy().is_initialized());

        assert!(facade.allocate(64).is_none());
        assert!(facade.allocate_atomic(64).is_none());
        assert_eq!(facade.stats().failures, 2);
    }

    #[test]
    pub fn test_both_kinds_under_each_strategy() {
        for kind in [StrategyKind::Collector, StrategyKind::RawHeap] {
            let facade = Facade::from_settings(&AllocSettings {
                strategy: kind,
                ..AllocSettings::default()
            });
            facade.initialize();
            assert_eq!(facade.kind(), kind);

            let traced = facade.allocate(64).unwrap();
            let atomic = facade.allocate_atomic(64).unwrap();
            assert_eq!(traced.kind(), ObjectKind::Traced);
            assert_eq!(atomic.kind(), ObjectKind::Atomic);
            assert!(traced.len() >= 64);
            assert!(atomic.len() >= 64);
            assert!(!traced.overlaps(&atomic));
        }
    }

    #[test]
    pub fn test_simulated_exhaustion_returns_none() {
        for kind in [StrategyKind::Collector, StrategyKind::RawHeap] {
            let facade = Facade::from_settings(&AllocSettings {
                strategy: kind,
                heap_limit_mib: Some(1),
                ..AllocSettings::default()
            });
            assert!(facade.allocate(4 * 1024 * 1024).is_none());
            assert!(facade.allocate_atomic(4 * 1024 * 1024).is_none());
        }
    }
}
