//! Allocation and memory management for the runtime
pub mod alloc;
pub mod block;
pub mod bump;
pub mod collect;
pub mod collector;
pub mod facade;
pub mod ffi;
pub mod header;
pub mod heap;
pub mod lob;
pub mod raw;
pub mod roots;
pub mod settings;
pub mod strategy;

pub use alloc::{MemoryBlock, ObjectKind};
pub use facade::{allocate, allocate_atomic, initialize, Facade, FacadeError};
pub use settings::AllocSettings;
pub use strategy::{AllocationStats, AllocationStrategy, StrategyKind};
