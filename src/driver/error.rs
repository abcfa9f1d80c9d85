//! Overall high-level error type for duckrt
use crate::memory::alloc::ObjectKind;
use crate::memory::facade::FacadeError;
use crate::memory::heap::HeapError;
use crate::memory::strategy::StrategyParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DuckError {
    #[error(transparent)]
    Strategy(#[from] StrategyParseError),
    #[error(transparent)]
    Facade(#[from] FacadeError),
    #[error(transparent)]
    Heap(#[from] HeapError),
    #[error("allocation {index} ({kind:?}, {size} bytes) failed")]
    AllocationFailed {
        index: usize,
        size: usize,
        kind: ObjectKind,
    },
    #[error("retained block from allocation {index} was corrupted")]
    Corrupted { index: usize },
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl DuckError {
    /// Process exit code to report this error with
    pub fn exit_code(&self) -> i32 {
        match self {
            DuckError::InvalidOption(_) | DuckError::Strategy(_) => 2,
            _ => 1,
        }
    }
}
