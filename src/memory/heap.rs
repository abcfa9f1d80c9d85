//! The collector heap
//!
//! Objects are laid out as `[AllocHeader | payload]` in bump blocks
//! (small and medium objects) or in their own large object blocks.
//! Every object not yet swept is recorded in an index keyed by
//! payload address so that conservative pointer candidates can be
//! resolved to objects, interior pointers included.

use std::collections::{BTreeMap, LinkedList};
use std::fmt::{Debug, Display};
use std::mem::size_of;
use std::ptr::{write, NonNull};

use parking_lot::Mutex;
use thiserror::Error;

use super::{
    alloc::ObjectKind,
    bump::{AllocError, BumpBlock, BLOCK_SIZE_BYTES, LINE_SIZE_BYTES, MAX_ALLOC_SIZE},
    collect::{self, CollectionReport},
    header::AllocHeader,
    lob::LargeObjectBlock,
    roots::{RootRange, RootSet},
};

/// Bytes taken by the header in front of every payload
pub const HEADER_SIZE: usize = size_of::<AllocHeader>();

/// Smallest payload handed out, so that zero sized requests still
/// receive a distinct addressable block
pub const MIN_PAYLOAD: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of standard blocks allocated
    pub blocks_allocated: usize,
    /// Number of large objects allocated
    pub lobs_allocated: usize,
    /// Number of blocks used and not reclaimed
    pub used: usize,
    /// Number of blocks used and recycled
    pub recycled: usize,
    /// Objects not yet swept
    pub objects: usize,
    /// Bytes obtained from the upstream allocator
    pub bytes_committed: usize,
}

/// Distribution of allocations by size class (count, total bytes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeClassStats {
    pub small: (u64, u64),
    pub medium: (u64, u64),
    pub large: (u64, u64),
}

/// Running totals since heap creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapCounters {
    pub objects_allocated: u64,
    pub atomic_objects_allocated: u64,
    pub bytes_allocated: u64,
    pub failed_allocations: u64,
    pub collections: u64,
    pub pressure_collections: u64,
    pub objects_freed: u64,
    pub bytes_freed: u64,
    pub size_classes: SizeClassStats,
}

/// Object size class.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SizeClass {
    /// Small objects fit inside a line
    Small,
    /// Medium objects span lines inside a block
    Medium,
    /// Large objects are larger than a normal block
    Large,
}

impl SizeClass {
    pub fn for_size(object_size: usize) -> SizeClass {
        if object_size < LINE_SIZE_BYTES {
            SizeClass::Small
        } else if object_size < BLOCK_SIZE_BYTES {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }
}

/// Heap of bump blocks and large objects plus everything the
/// collector needs to trace it
pub struct HeapState {
    /// For allocating small objects
    pub(super) head: Option<BumpBlock>,
    /// For allocating medium objects
    pub(super) overflow: Option<BumpBlock>,
    /// Recycled - part used but reclaimed
    pub(super) recycled: LinkedList<BumpBlock>,
    /// Part used - not yet reclaimed
    pub(super) rest: LinkedList<BumpBlock>,
    /// Large object blocks - each contains single object
    pub(super) lobs: Vec<LargeObjectBlock>,
    /// Payload address to payload length of every unswept object
    pub(super) objects: BTreeMap<usize, usize>,
    /// Registered roots
    pub(super) roots: RootSet,
    /// Header mark bit value that means "marked"; flips each collection
    pub(super) mark_state: bool,
    /// Maximum committed bytes
    limit: Option<usize>,
    pub(super) counters: HeapCounters,
}

impl Debug for HeapState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for block in &self.rest {
            writeln!(f, "(XX) {:?}", block)?;
        }

        for block in &self.recycled {
            writeln!(f, "(Cy) {:?}", block)?;
        }

        if let Some(head) = &self.head {
            writeln!(f, "(Hd) {:?}", head)?;
        }

        if let Some(of) = &self.overflow {
            writeln!(f, "(Ov) {:?}", of)?;
        }

        for lob in &self.lobs {
            writeln!(f, "(Lo) {:?}", lob)?;
        }

        writeln!(f, "{} objects", self.objects.len())
    }
}

impl HeapState {
    pub fn new(limit: Option<usize>) -> Self {
        HeapState {
            head: None,
            overflow: None,
            recycled: LinkedList::default(),
            rest: LinkedList::default(),
            lobs: vec![],
            objects: BTreeMap::new(),
            roots: RootSet::default(),
            mark_state: false,
            limit,
            counters: HeapCounters::default(),
        }
    }

    /// Number of bump blocks owned by the heap
    fn block_count(&self) -> usize {
        self.rest.len()
            + self.recycled.len()
            + self.head.iter().count()
            + self.overflow.iter().count()
    }

    /// Bytes currently obtained from the upstream allocator
    pub fn committed_bytes(&self) -> usize {
        self.block_count() * BLOCK_SIZE_BYTES
            + self
                .lobs
                .iter()
                .map(LargeObjectBlock::allocated_size)
                .sum::<usize>()
    }

    /// Fail if taking `extra` more bytes upstream would break the limit
    fn ensure_capacity(&self, extra: usize) -> Result<(), AllocError> {
        match self.limit {
            Some(limit) if self.committed_bytes() + extra > limit => Err(AllocError::OOM),
            _ => Ok(()),
        }
    }

    fn fresh_block(&self) -> Result<BumpBlock, AllocError> {
        self.ensure_capacity(BLOCK_SIZE_BYTES)?;
        BumpBlock::new()
    }

    /// Get head block, creating if necessary
    pub fn head(&mut self) -> Result<&mut BumpBlock, AllocError> {
        if self.head.is_none() {
            self.head = Some(self.fresh_block()?);
        }
        self.head.as_mut().ok_or(AllocError::OOM)
    }

    /// Get overflow block, creating if necessary
    pub fn overflow(&mut self) -> Result<&mut BumpBlock, AllocError> {
        if self.overflow.is_none() {
            self.overflow = Some(self.fresh_block()?);
        }
        self.overflow.as_mut().ok_or(AllocError::OOM)
    }

    /// Retire the head block, preferring a recycled block as the
    /// replacement
    pub fn replace_head(&mut self) -> Result<&mut BumpBlock, AllocError> {
        let replacement = match self.recycled.pop_front() {
            Some(block) => block,
            None => self.fresh_block()?,
        };

        if let Some(old) = self.head.replace(replacement) {
            self.rest.push_back(old);
        }
        self.head.as_mut().ok_or(AllocError::OOM)
    }

    /// Retire the overflow block, preferring a recycled block whose
    /// current hole can take `size` bytes
    pub fn replace_overflow(&mut self, size: usize) -> Result<&mut BumpBlock, AllocError> {
        let fits = self
            .recycled
            .iter()
            .position(|block| block.current_hole_size() >= size);

        let reused = fits.and_then(|index| {
            let mut tail = self.recycled.split_off(index);
            let block = tail.pop_front();
            self.recycled.append(&mut tail);
            block
        });

        let replacement = match reused {
            Some(block) => block,
            None => self.fresh_block()?,
        };
        if let Some(old) = self.overflow.replace(replacement) {
            self.rest.push_back(old);
        }
        self.overflow.as_mut().ok_or(AllocError::OOM)
    }

    /// Create and return a new large object block able to store data
    /// of the specified size
    pub fn lob(&mut self, size: usize) -> Result<&mut LargeObjectBlock, AllocError> {
        self.ensure_capacity(LargeObjectBlock::efficient_size_for(size))?;
        self.lobs.push(LargeObjectBlock::new(size)?);
        self.lobs.last_mut().ok_or(AllocError::OOM)
    }

    /// Find space for `size_bytes` (header included) without collecting
    pub fn try_allocate(&mut self, size_bytes: usize) -> Result<*const u8, AllocError> {
        match SizeClass::for_size(size_bytes) {
            SizeClass::Large => Ok(self.lob(size_bytes)?.space()),
            SizeClass::Medium if size_bytes > self.head()?.current_hole_size() => {
                if let Some(space) = self.overflow()?.bump(size_bytes) {
                    return Ok(space);
                }
                self.replace_overflow(size_bytes)?
                    .bump(size_bytes)
                    .ok_or(AllocError::OOM)
            }
            _ => {
                if let Some(space) = self.head()?.bump(size_bytes) {
                    return Ok(space);
                }
                self.replace_head()?.bump(size_bytes).ok_or(AllocError::OOM)
            }
        }
    }

    /// Resolve a candidate pointer to the object whose payload
    /// contains it, returning (payload address, payload length)
    pub fn find_object(&self, candidate: usize) -> Option<(usize, usize)> {
        self.objects
            .range(..=candidate)
            .next_back()
            .filter(|(start, len)| candidate < *start + *len)
            .map(|(start, len)| (*start, *len))
    }

    /// Header of the object with the given payload address
    pub fn header_of(&self, payload: usize) -> NonNull<AllocHeader> {
        debug_assert!(self.objects.contains_key(&payload));
        // SAFETY: every indexed payload is preceded by its header
        unsafe { NonNull::new_unchecked((payload - HEADER_SIZE) as *mut AllocHeader) }
    }

    fn record_allocation(&mut self, alloc_size: usize, kind: ObjectKind) {
        self.counters.objects_allocated += 1;
        self.counters.bytes_allocated += alloc_size as u64;
        if kind == ObjectKind::Atomic {
            self.counters.atomic_objects_allocated += 1;
        }

        #[cfg(any(debug_assertions, feature = "gc-telemetry"))]
        {
            let slot = match SizeClass::for_size(alloc_size) {
                SizeClass::Small => &mut self.counters.size_classes.small,
                SizeClass::Medium => &mut self.counters.size_classes.medium,
                SizeClass::Large => &mut self.counters.size_classes.large,
            };
            slot.0 += 1;
            slot.1 += alloc_size as u64;
        }
    }

    /// Statistics
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            blocks_allocated: self.block_count(),
            lobs_allocated: self.lobs.len(),
            used: self.rest.len(),
            recycled: self.recycled.len(),
            objects: self.objects.len(),
            bytes_committed: self.committed_bytes(),
        }
    }

    fn context(
        &self,
        requested_size: usize,
        collection_attempted: bool,
    ) -> HeapContext {
        HeapContext {
            blocks_allocated: self.block_count(),
            blocks_recycled: self.recycled.len(),
            lobs_allocated: self.lobs.len(),
            bytes_committed: self.committed_bytes(),
            requested_size,
            size_class: SizeClass::for_size(requested_size),
            collection_attempted,
            heap_limit: self.limit,
        }
    }
}

/// Heap context for error diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct HeapContext {
    /// Total blocks allocated
    pub blocks_allocated: usize,
    /// Blocks recycled and available for reuse
    pub blocks_recycled: usize,
    /// Large object blocks allocated
    pub lobs_allocated: usize,
    /// Bytes obtained upstream
    pub bytes_committed: usize,
    /// Requested allocation size (header included) that failed
    pub requested_size: usize,
    /// Size class of the failed allocation
    pub size_class: SizeClass,
    /// Whether a pressure collection ran before giving up
    pub collection_attempted: bool,
    /// Heap limit in bytes (if configured)
    pub heap_limit: Option<usize>,
}

impl Display for HeapContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to allocate {} bytes ({:?}) | heap: {} bytes committed ({} blocks, {} recycled), {} LOBs",
            self.requested_size,
            self.size_class,
            self.bytes_committed,
            self.blocks_allocated,
            self.blocks_recycled,
            self.lobs_allocated,
        )?;
        match self.heap_limit {
            Some(limit) => write!(f, " | limit: {} bytes", limit)?,
            None => write!(f, " | no limit")?,
        }
        if self.collection_attempted {
            write!(f, " | collection attempted")?;
        }
        Ok(())
    }
}

/// Heap-level errors
#[derive(Debug, Clone, Error)]
pub enum HeapError {
    /// No space could be found, even after collecting
    #[error("out of memory: {context}")]
    OutOfMemory { context: HeapContext },
    /// Request too large for an object header to describe
    #[error("invalid allocation size: requested {requested_size} bytes exceeds maximum {max_size} bytes")]
    InvalidAllocationSize {
        requested_size: usize,
        max_size: usize,
    },
}

/// A conservatively collected heap (with interior locking)
pub struct Heap {
    state: Mutex<HeapState>,
    /// Dump heap state and collection progress to stderr
    trace: bool,
    /// Collect and retry when space runs out
    pressure: bool,
}

impl Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&*self.state.lock(), f)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            state: Mutex::new(HeapState::new(None)),
            trace: false,
            pressure: false,
        }
    }

    /// Heap that may commit at most `limit_bytes` upstream
    pub fn with_limit(limit_bytes: usize) -> Self {
        Heap {
            state: Mutex::new(HeapState::new(Some(limit_bytes))),
            trace: false,
            pressure: false,
        }
    }

    /// Turn on stderr tracing of collections
    pub fn traced(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Run a collection when an allocation cannot find space, then
    /// retry once.
    ///
    /// Only the registered roots are consulted, so every block the
    /// host still holds must be reachable from them.
    pub fn collecting_on_pressure(mut self, pressure: bool) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn stats(&self) -> HeapStats {
        self.state.lock().stats()
    }

    pub fn counters(&self) -> HeapCounters {
        self.state.lock().counters.clone()
    }

    /// Allocate `size_bytes` of payload, zero filled unless atomic
    pub fn alloc_bytes(&self, size_bytes: usize, kind: ObjectKind) -> Result<NonNull<u8>, HeapError> {
        let payload_size = match Self::payload_size_for(size_bytes) {
            Ok(size) => size,
            Err(e) => {
                self.state.lock().counters.failed_allocations += 1;
                return Err(e);
            }
        };
        let alloc_size = HEADER_SIZE + payload_size;

        let mut state = self.state.lock();
        let space = match self.find_space(&mut state, alloc_size) {
            Ok(space) => space,
            Err(e) => {
                state.counters.failed_allocations += 1;
                return Err(e);
            }
        };

        let header = AllocHeader::new(kind, payload_size as u32, state.mark_state);

        // SAFETY: find_space returned alloc_size bytes of exclusive,
        // 16 byte aligned space
        let payload = unsafe {
            write(space as *mut AllocHeader, header);
            let payload = space.add(HEADER_SIZE) as *mut u8;
            if kind == ObjectKind::Traced {
                std::ptr::write_bytes(payload, 0, payload_size);
            }
            NonNull::new_unchecked(payload)
        };

        state.objects.insert(payload.as_ptr() as usize, payload_size);
        state.record_allocation(alloc_size, kind);

        Ok(payload)
    }

    /// Allocate space, collecting once under pressure if enabled
    fn find_space(&self, state: &mut HeapState, size_bytes: usize) -> Result<*const u8, HeapError> {
        if let Ok(space) = state.try_allocate(size_bytes) {
            return Ok(space);
        }

        if !self.pressure {
            return Err(HeapError::OutOfMemory {
                context: state.context(size_bytes, false),
            });
        }

        if self.trace {
            eprintln!(
                "Pressure collection: attempting to free space for {} bytes",
                size_bytes
            );
        }

        state.counters.pressure_collections += 1;
        collect::collect(state, &[], self.trace);

        state
            .try_allocate(size_bytes)
            .map_err(|_| HeapError::OutOfMemory {
                context: state.context(size_bytes, true),
            })
    }

    /// Size rounded up to a double-word boundary so that headers and
    /// payloads stay 16 byte aligned, or None if that overflows
    pub fn alloc_size_of(object_size: usize) -> Option<usize> {
        let align = size_of::<usize>() * 2;
        object_size
            .checked_add(align - 1)
            .map(|padded| padded & !(align - 1))
    }

    /// Payload length handed out for a request of `size_bytes`
    pub fn payload_size_for(size_bytes: usize) -> Result<usize, HeapError> {
        Self::alloc_size_of(size_bytes.max(MIN_PAYLOAD))
            .filter(|size| *size <= MAX_ALLOC_SIZE - HEADER_SIZE)
            .ok_or(HeapError::InvalidAllocationSize {
                requested_size: size_bytes,
                max_size: MAX_ALLOC_SIZE - HEADER_SIZE,
            })
    }

    /// Register a root range
    ///
    /// # Safety
    ///
    /// The range must remain readable until it is unregistered.
    pub unsafe fn add_roots(&self, range: RootRange) {
        self.state.lock().roots.add(range);
    }

    /// Unregister the root range starting at `start`
    pub fn remove_roots(&self, start: usize) -> bool {
        self.state.lock().roots.remove(start)
    }

    /// Collect using the registered roots
    pub fn collect(&self) -> CollectionReport {
        let mut state = self.state.lock();
        collect::collect(&mut state, &[], self.trace)
    }

    /// Collect using the registered roots plus `extra` ranges
    ///
    /// # Safety
    ///
    /// Every extra range must be readable for the duration of the
    /// call.
    pub unsafe fn collect_with(&self, extra: &[RootRange]) -> CollectionReport {
        let mut state = self.state.lock();
        collect::collect(&mut state, extra, self.trace)
    }

    /// Whether an unswept object's payload contains `addr`
    pub fn is_live(&self, addr: usize) -> bool {
        self.state.lock().find_object(addr).is_some()
    }

    /// Kind of the object containing `addr`, if any
    pub fn kind_of(&self, addr: usize) -> Option<ObjectKind> {
        let state = self.state.lock();
        state
            .find_object(addr)
            .map(|(payload, _)| unsafe { state.header_of(payload).as_ref().kind() })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    pub fn test_simple_allocations() {
        let heap = Heap::new();

        let ptr = heap.alloc_bytes(24, ObjectKind::Traced).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 16, 0);

        let state = heap.state.lock();
        let (payload, len) = state.find_object(ptr.as_ptr() as usize).unwrap();
        assert_eq!(payload, ptr.as_ptr() as usize);
        assert_eq!(len, 32);

        let header = state.header_of(payload);
        unsafe {
            assert!(!header.as_ref().is_marked(state.mark_state));
            assert_eq!(header.as_ref().kind(), ObjectKind::Traced);
        }
    }

    #[test]
    pub fn test_traced_payload_is_zeroed() {
        let heap = Heap::new();
        let ptr = heap.alloc_bytes(256, ObjectKind::Traced).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 256) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    pub fn test_zero_size_gets_minimum_payload() {
        let heap = Heap::new();
        let a = heap.alloc_bytes(0, ObjectKind::Traced).unwrap();
        let b = heap.alloc_bytes(0, ObjectKind::Atomic).unwrap();
        assert_ne!(a, b);
        assert_eq!(heap.kind_of(b.as_ptr() as usize), Some(ObjectKind::Atomic));
        assert_eq!(heap.stats().objects, 2);
    }

    #[test]
    pub fn test_several_blocks() {
        let heap = Heap::new();

        for i in 0..32000usize {
            let ptr = heap.alloc_bytes(16, ObjectKind::Atomic).unwrap();
            unsafe { (ptr.as_ptr() as *mut usize).write(i) };
            unsafe { assert_eq!((ptr.as_ptr() as *const usize).read(), i) };
        }

        assert!(heap.stats().blocks_allocated > 1);
    }

    #[test]
    pub fn test_medium_object_goes_to_overflow_when_head_is_short() {
        let heap = Heap::new();
        // use up most of the head block
        heap.alloc_bytes(BLOCK_SIZE_BYTES - 1024, ObjectKind::Atomic)
            .unwrap();
        heap.alloc_bytes(4096, ObjectKind::Atomic).unwrap();

        let state = heap.state.lock();
        assert!(state.overflow.is_some());
        assert_eq!(state.lobs.len(), 0);
    }

    #[test]
    pub fn test_large_object_block() {
        let heap = Heap::new();
        let ptr = heap
            .alloc_bytes(BLOCK_SIZE_BYTES * 2, ObjectKind::Traced)
            .unwrap();

        assert_eq!(heap.stats().lobs_allocated, 1);
        assert!(heap.is_live(ptr.as_ptr() as usize + BLOCK_SIZE_BYTES));
    }

    #[test]
    pub fn test_interior_pointers_resolve() {
        let heap = Heap::new();
        let ptr = heap.alloc_bytes(100, ObjectKind::Traced).unwrap();
        let base = ptr.as_ptr() as usize;

        let state = heap.state.lock();
        assert_eq!(state.find_object(base + 50).map(|o| o.0), Some(base));
        assert_eq!(state.find_object(base + 111).map(|o| o.0), Some(base));
        assert_eq!(state.find_object(base + 112), None);
        // header is not part of the payload
        assert_eq!(state.find_object(base - 1), None);
    }

    #[test]
    pub fn test_invalid_size() {
        let heap = Heap::new();
        for size in [usize::MAX, usize::MAX - 15, MAX_ALLOC_SIZE, MAX_ALLOC_SIZE + 1] {
            let result = heap.alloc_bytes(size, ObjectKind::Atomic);
            assert!(matches!(
                result,
                Err(HeapError::InvalidAllocationSize { requested_size, .. }) if requested_size == size
            ));
        }
        assert_eq!(heap.counters().failed_allocations, 4);
        assert_eq!(heap.stats().objects, 0);
    }

    #[test]
    pub fn test_limit_produces_out_of_memory_with_context() {
        let heap = Heap::with_limit(BLOCK_SIZE_BYTES).collecting_on_pressure(true);
        let result = heap.alloc_bytes(BLOCK_SIZE_BYTES * 4, ObjectKind::Atomic);

        match result {
            Err(HeapError::OutOfMemory { context }) => {
                assert!(context.collection_attempted);
                assert_eq!(context.heap_limit, Some(BLOCK_SIZE_BYTES));
                assert_eq!(context.size_class, SizeClass::Large);

                let message = format!("{}", HeapError::OutOfMemory { context });
                assert!(message.contains("out of memory"));
                assert!(message.contains("limit"));
                assert!(message.contains("collection attempted"));
            }
            other => panic!("expected out of memory, got {:?}", other),
        }
    }

    #[test]
    pub fn test_full_heap_fails_without_collecting() {
        let heap = Heap::with_limit(BLOCK_SIZE_BYTES * 2);
        let first = heap.alloc_bytes(1000, ObjectKind::Atomic).unwrap();

        let mut allocated = 1;
        let error = loop {
            match heap.alloc_bytes(1000, ObjectKind::Atomic) {
                Ok(_) => allocated += 1,
                Err(e) => break e,
            }
        };

        match error {
            HeapError::OutOfMemory { context } => assert!(!context.collection_attempted),
            other => panic!("expected out of memory, got {:?}", other),
        }
        assert!(allocated > 1);
        assert_eq!(heap.counters().collections, 0);
        assert!(heap.is_live(first.as_ptr() as usize));
        assert_eq!(heap.stats().objects, allocated);
    }

    #[test]
    pub fn test_pressure_collection_reclaims_unrooted_space() {
        // room for exactly two blocks
        let heap = Heap::with_limit(BLOCK_SIZE_BYTES * 2).collecting_on_pressure(true);

        // fill far more than two blocks worth with garbage
        for _ in 0..(BLOCK_SIZE_BYTES * 8 / 1024) {
            heap.alloc_bytes(1000, ObjectKind::Atomic).unwrap();
        }

        let counters = heap.counters();
        assert!(counters.pressure_collections > 0);
        assert!(counters.objects_freed > 0);
        assert!(heap.stats().bytes_committed <= BLOCK_SIZE_BYTES * 2);
    }

    #[test]
    pub fn test_size_of_rounding() {
        assert_eq!(Heap::alloc_size_of(1), Some(16));
        assert_eq!(Heap::alloc_size_of(16), Some(16));
        assert_eq!(Heap::alloc_size_of(17), Some(32));
        assert_eq!(Heap::alloc_size_of(usize::MAX - 14), None);

        assert_eq!(Heap::payload_size_for(0).unwrap(), MIN_PAYLOAD);
        assert!(Heap::payload_size_for(usize::MAX).is_err());
    }

    #[test]
    pub fn test_size_class_counters() {
        let heap = Heap::new();
        heap.alloc_bytes(16, ObjectKind::Traced).unwrap();
        heap.alloc_bytes(1024, ObjectKind::Atomic).unwrap();
        heap.alloc_bytes(BLOCK_SIZE_BYTES, ObjectKind::Atomic).unwrap();

        let counters = heap.counters();
        assert_eq!(counters.objects_allocated, 3);
        assert_eq!(counters.atomic_objects_allocated, 2);
        if cfg!(any(debug_assertions, feature = "gc-telemetry")) {
            assert_eq!(counters.size_classes.small.0, 1);
            assert_eq!(counters.size_classes.medium.0, 1);
            assert_eq!(counters.size_classes.large.0, 1);
        }
    }
}
