//! Allocation settings
//!
//! Settings can come from the command line or the environment and
//! default to the strategy the crate was built for.

use structopt::StructOpt;

use super::strategy::StrategyKind;

/// Settings to control which allocator backs the runtime and how
#[derive(StructOpt, Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocSettings {
    /// Allocation strategy (collector or raw-heap)
    #[structopt(long = "alloc-strategy", env = "DUCK_ALLOC_STRATEGY", default_value)]
    pub strategy: StrategyKind,
    /// Maximum heap size in MiB for the collector heap or raw heap
    #[structopt(long = "heap-limit-mib", env = "DUCK_HEAP_LIMIT_MIB")]
    pub heap_limit_mib: Option<usize>,
    /// Trace collections to stderr
    #[structopt(long = "gc-trace")]
    pub gc_trace: bool,
    /// When the collector heap is full, collect using the registered
    /// roots and retry instead of failing
    #[structopt(long = "gc-on-pressure")]
    pub gc_on_pressure: bool,
}

impl AllocSettings {
    /// Heap limit in bytes, if any
    pub fn heap_limit_bytes(&self) -> Option<usize> {
        self.heap_limit_mib.map(|mib| mib.saturating_mul(1_048_576))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_parse_from_args() {
        let settings = AllocSettings::from_iter_safe(vec![
            "test",
            "--alloc-strategy",
            "gc",
            "--heap-limit-mib",
            "8",
            "--gc-trace",
            "--gc-on-pressure",
        ])
        .unwrap();

        assert_eq!(settings.strategy, StrategyKind::Collector);
        assert_eq!(settings.heap_limit_mib, Some(8));
        assert_eq!(settings.heap_limit_bytes(), Some(8 * 1024 * 1024));
        assert!(settings.gc_trace);
        assert!(settings.gc_on_pressure);
    }

    #[test]
    pub fn test_rejects_unknown_strategy() {
        let result = AllocSettings::from_iter_safe(vec!["test", "--alloc-strategy", "boehm"]);
        assert!(result.is_err());
    }

    #[test]
    pub fn test_default_has_no_limit() {
        let settings = AllocSettings::default();
        assert_eq!(settings.strategy, StrategyKind::default());
        assert_eq!(settings.heap_limit_bytes(), None);
        assert!(!settings.gc_trace);
        assert!(!settings.gc_on_pressure);
    }
}
