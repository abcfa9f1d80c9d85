extern crate duck_runtime;

use std::process;

use duck_runtime::driver::options::DuckOptions;
use duck_runtime::driver::statistics::Statistics;
use duck_runtime::driver::workload::Workload;
use duck_runtime::memory::facade::{self, Facade};
use structopt::StructOpt;

pub fn main() {
    let mut opt = DuckOptions::from_args();

    if let Err(e) = opt.process_defaults() {
        eprintln!("{e}");
        process::exit(e.exit_code());
    }

    // For a dry run, just explain the options
    if opt.explain() {
        println!("{}", opt.explanation());
        process::exit(0);
    }

    let installed = match facade::install(Facade::from_settings(opt.alloc_settings())) {
        Ok(installed) => installed,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    match Workload::from(&opt).run(installed) {
        Ok(statistics) => exit(&opt, 0, &statistics),
        Err(e) => {
            eprintln!("{e}");
            let mut statistics = Statistics::default();
            statistics.set_alloc_stats(installed.stats());
            exit(&opt, e.exit_code(), &statistics)
        }
    }
}

/// Optionally dump stats to stderr then exit
pub fn exit(opts: &DuckOptions, code: i32, stats: &Statistics) {
    if opts.statistics() {
        eprintln!();
        eprintln!("~~~~~~~~~~");
        eprintln!("STATISTICS");
        eprintln!("~~~~~~~~~~");
        eprintln!();
        eprintln!("{stats}");
    }
    process::exit(code)
}
