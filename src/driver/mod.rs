//! Command line driver for exercising the allocator
pub mod error;
pub mod options;
pub mod statistics;
pub mod workload;
