//! Capture and report statistics for tuning

use std::{fmt::Display, time::Duration};

use indexmap::IndexMap;

use crate::memory::strategy::AllocationStats;

#[derive(Default, Debug)]
pub struct Timings {
    timings: IndexMap<String, Duration>,
}

impl Timings {
    pub fn record<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        self.timings.insert(name.as_ref().to_string(), elapsed);
    }

    /// Add to an existing timing (or start one)
    pub fn accumulate<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        *self
            .timings
            .entry(name.as_ref().to_string())
            .or_insert(Duration::ZERO) += elapsed;
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<Duration> {
        self.timings.get(name.as_ref()).copied()
    }
}

impl Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.timings.keys().map(|k| k.len()).max().unwrap_or(0) + 1;

        for (k, v) in &self.timings {
            writeln!(f, "{:width$}: {:14.9}s", k, v.as_secs_f64(), width = width)?;
        }
        Ok(())
    }
}

/// The statistics captured during a run
#[derive(Default, Debug)]
pub struct Statistics {
    alloc: AllocationStats,
    timings: Timings,
}

impl Statistics {
    pub fn set_alloc_stats(&mut self, stats: AllocationStats) {
        self.alloc = stats;
    }

    pub fn alloc_stats(&self) -> &AllocationStats {
        &self.alloc
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Allocations     : {:12}", self.alloc.allocations)?;
        writeln!(f, "Atomic Allocs   : {:12}", self.alloc.atomic_allocations)?;
        writeln!(f, "Bytes Allocated : {:12}", self.alloc.bytes_allocated)?;
        writeln!(f, "Failures        : {:12}", self.alloc.failures)?;
        writeln!(f, "Collections     : {:12}", self.alloc.collections)?;
        writeln!(f, "Bytes Reclaimed : {:12}", self.alloc.bytes_reclaimed)?;
        writeln!(f, "Bytes Committed : {:12}", self.alloc.bytes_committed)?;
        writeln!(f)?;
        writeln!(f, "{}", self.timings)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_empty_timings_display() {
        assert_eq!(format!("{}", Timings::default()), "");
    }

    #[test]
    pub fn test_accumulate_and_record() {
        let mut a = Timings::default();
        a.accumulate("collect", Duration::from_millis(2));
        a.accumulate("collect", Duration::from_millis(3));
        assert_eq!(a.get("collect"), Some(Duration::from_millis(5)));

        a.record("workload", Duration::from_secs(1));
        a.record("workload", Duration::from_secs(2));
        assert_eq!(a.get("workload"), Some(Duration::from_secs(2)));

        let text = format!("{}", a);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("collect"));
    }

    #[test]
    pub fn test_statistics_report() {
        let mut stats = Statistics::default();
        stats.set_alloc_stats(AllocationStats {
            allocations: 10,
            atomic_allocations: 3,
            ..AllocationStats::default()
        });

        assert_eq!(stats.alloc_stats().allocations, 10);
        assert!(format!("{}", stats).contains("Atomic Allocs   :            3"));
    }
}
