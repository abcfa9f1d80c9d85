//! C entry points for generated code
//!
//! Compiled programs link against these symbols. Failure is a null
//! pointer; nothing here panics across the boundary.

use std::ffi::c_void;
use std::ptr;

use super::{alloc::MemoryBlock, facade};

fn as_raw(block: Option<MemoryBlock>) -> *mut c_void {
    block.map_or(ptr::null_mut(), |b| b.as_ptr().cast())
}

/// Set up the process-wide allocator. Idempotent.
#[no_mangle]
pub extern "C" fn duck_init() {
    facade::initialize()
}

/// Allocate `size` bytes that may hold references, or null
#[no_mangle]
pub extern "C" fn duck_alloc(size: usize) -> *mut c_void {
    as_raw(facade::allocate(size))
}

/// Allocate `size` pointer free bytes, or null
#[no_mangle]
pub extern "C" fn duck_alloc_atomic(size: usize) -> *mut c_void {
    as_raw(facade::allocate_atomic(size))
}
