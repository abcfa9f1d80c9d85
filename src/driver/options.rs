//! Command line argument handling for the `duckrt` driver

use structopt::StructOpt;

use crate::driver::error::DuckError;
use crate::memory::settings::AllocSettings;

/// duckrt - exercise the duck runtime allocator
#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "duckrt")]
pub struct DuckOptions {
    /// Turn on debug features (implies --gc-trace)
    #[structopt(short = "d", long = "debug")]
    pub debug: bool,

    /// Print metrics to stderr before exiting
    #[structopt(short = "S", long = "statistics")]
    pub statistics: bool,

    /// Explain what would be run and exit
    #[structopt(long = "explain")]
    pub explain: bool,

    /// Number of blocks to allocate
    #[structopt(short = "n", long = "count", default_value = "100000")]
    pub count: usize,

    /// Requested size of each block in bytes
    #[structopt(short = "s", long = "size", default_value = "64")]
    pub size: usize,

    /// Make every Nth block atomic (0 for none)
    #[structopt(long = "atomic-every", default_value = "4")]
    pub atomic_every: usize,

    /// Number of most recent blocks kept reachable from roots
    #[structopt(long = "retain", default_value = "64")]
    pub retain: usize,

    /// Run an explicit collection after every N allocations (0 for
    /// never)
    #[structopt(long = "collect-every", default_value = "0")]
    pub collect_every: usize,

    #[structopt(flatten)]
    pub alloc_settings: AllocSettings,
}

impl Default for DuckOptions {
    fn default() -> Self {
        DuckOptions {
            debug: false,
            statistics: false,
            explain: false,
            count: 100_000,
            size: 64,
            atomic_every: 4,
            retain: 64,
            collect_every: 0,
            alloc_settings: AllocSettings::default(),
        }
    }
}

impl DuckOptions {
    /// Check combinations and fold implied settings in
    pub fn process_defaults(&mut self) -> Result<(), DuckError> {
        if self.retain == 0 {
            return Err(DuckError::InvalidOption(
                "--retain must keep at least one block".to_string(),
            ));
        }

        if self.debug {
            self.alloc_settings.gc_trace = true;
        }

        Ok(())
    }

    pub fn alloc_settings(&self) -> &AllocSettings {
        &self.alloc_settings
    }

    pub fn statistics(&self) -> bool {
        self.statistics
    }

    pub fn explain(&self) -> bool {
        self.explain
    }

    pub fn explanation(&self) -> String {
        let mut explanation = String::new();

        explanation.push_str(&format!(
            "duckrt will allocate {} blocks of {} bytes using the {} strategy",
            self.count, self.size, self.alloc_settings.strategy
        ));
        explanation.push_str("\n\n");

        if self.atomic_every > 0 {
            explanation.push_str(&format!(
                "Every {} blocks one will be atomic (pointer free).\n",
                self.atomic_every
            ));
        } else {
            explanation.push_str("No atomic blocks will be allocated.\n");
        }

        explanation.push_str(&format!(
            "The {} most recent blocks stay reachable from a root window.\n",
            self.retain
        ));

        if self.collect_every > 0 {
            explanation.push_str(&format!(
                "A collection will be requested every {} allocations.\n",
                self.collect_every
            ));
        }

        match self.alloc_settings.heap_limit_mib {
            Some(mib) => explanation.push_str(&format!("Heap limit: {} MiB\n", mib)),
            None => explanation.push_str("Heap limit: none\n"),
        }

        if self.alloc_settings.gc_trace {
            explanation.push_str("Collections will be traced to stderr.\n");
        }

        if self.alloc_settings.gc_on_pressure {
            explanation.push_str("A full heap will collect and retry before failing.\n");
        }

        explanation
    }
}
