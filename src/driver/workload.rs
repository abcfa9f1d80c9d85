//! Synthetic allocation workload
//!
//! Allocates a stream of blocks through a facade, keeping a sliding
//! window of the most recent ones reachable from a registered root
//! range. Traced blocks point at the latest atomic block so that the
//! collector has references to follow. Every retained block is checked
//! at the end.

use std::time::Instant;

use crate::driver::{error::DuckError, options::DuckOptions, statistics::Statistics};
use crate::memory::{
    alloc::{MemoryBlock, ObjectKind},
    facade::Facade,
    roots::RootRange,
};

/// Shape of a workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub count: usize,
    pub size: usize,
    pub atomic_every: usize,
    pub retain: usize,
    pub collect_every: usize,
}

impl From<&DuckOptions> for Workload {
    fn from(opts: &DuckOptions) -> Self {
        Workload {
            count: opts.count,
            size: opts.size,
            atomic_every: opts.atomic_every,
            retain: opts.retain.max(1),
            collect_every: opts.collect_every,
        }
    }
}

/// Recognisable byte for allocation `index`
fn tag(index: usize) -> u8 {
    (index % 251) as u8 + 1
}

impl Workload {
    fn kind_for(&self, index: usize) -> ObjectKind {
        if self.atomic_every > 0 && index % self.atomic_every == 0 {
            ObjectKind::Atomic
        } else {
            ObjectKind::Traced
        }
    }

    /// Run against `facade`, returning statistics for the run
    pub fn run(&self, facade: &Facade) -> Result<Statistics, DuckError> {
        let mut statistics = Statistics::default();
        let start = Instant::now();

        facade.initialize();
        statistics.timings_mut().record("initialize", start.elapsed());

        // root window: addresses of the most recent blocks
        let mut window = vec![0usize; self.retain].into_boxed_slice();
        let mut indices = vec![usize::MAX; self.retain];
        let strategy = facade.strategy();
        unsafe { strategy.register_roots(RootRange::from_slice(&window[..])) };

        let result = self.allocate_all(facade, &mut window, &mut indices, &mut statistics);

        strategy.unregister_roots(window.as_ptr() as usize);
        result?;

        statistics.timings_mut().record("workload", start.elapsed());
        statistics.set_alloc_stats(facade.stats());
        Ok(statistics)
    }

    fn allocate_all(
        &self,
        facade: &Facade,
        window: &mut [usize],
        indices: &mut [usize],
        statistics: &mut Statistics,
    ) -> Result<(), DuckError> {
        let mut latest_atomic: usize = 0;

        for index in 0..self.count {
            let kind = self.kind_for(index);
            let block = match kind {
                ObjectKind::Traced => facade.allocate(self.size),
                ObjectKind::Atomic => facade.allocate_atomic(self.size),
            }
            .ok_or(DuckError::AllocationFailed {
                index,
                size: self.size,
                kind,
            })?;

            self.fill(&block, index, latest_atomic);
            if kind == ObjectKind::Atomic {
                latest_atomic = block.as_ptr() as usize;
            }

            let slot = index % self.retain;
            // the collector reads the window behind our back
            unsafe { std::ptr::write_volatile(window.as_mut_ptr().add(slot), block.as_ptr() as usize) };
            indices[slot] = index;

            if self.collect_every > 0 && (index + 1) % self.collect_every == 0 {
                let start = Instant::now();
                if facade.strategy().collect().is_some() {
                    statistics.timings_mut().accumulate("collect", start.elapsed());
                }
            }
        }

        let start = Instant::now();
        for (addr, index) in window.iter().zip(indices.iter()) {
            if *index != usize::MAX {
                self.verify(*addr, *index)?;
            }
        }
        statistics.timings_mut().record("verify", start.elapsed());

        Ok(())
    }

    /// Tag the block's bytes and, for traced blocks, store a reference
    /// to the latest atomic block in the first word
    fn fill(&self, block: &MemoryBlock, index: usize, latest_atomic: usize) {
        // SAFETY: block was just allocated and nothing else refers to it
        let bytes = unsafe { block.as_mut_slice() };
        let requested = &mut bytes[..self.size];
        requested.fill(tag(index));

        let word = std::mem::size_of::<usize>();
        if block.kind() == ObjectKind::Traced && self.size >= 2 * word {
            requested[..word].copy_from_slice(&latest_atomic.to_ne_bytes());
        }
    }

    fn verify(&self, addr: usize, index: usize) -> Result<(), DuckError> {
        if self.size == 0 {
            return Ok(());
        }

        // SAFETY: the block is reachable from the root window
        let last = unsafe { *((addr + self.size - 1) as *const u8) };
        if last == tag(index) {
            Ok(())
        } else {
            Err(DuckError::Corrupted { index })
        }
    }
}
