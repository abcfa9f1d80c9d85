//! Conservative mark and sweep
//!
//! Every aligned word of every root range is treated as a potential
//! pointer. A word that lands in the payload of an indexed object
//! (anywhere in it, not only at its start) keeps that object alive.
//! Traced payloads are scanned the same way; atomic payloads never
//! are.

use std::collections::{BTreeMap, LinkedList, VecDeque};
use std::ptr::NonNull;
use std::time::{Duration, Instant};

use super::{
    alloc::ObjectKind,
    bump::{BumpBlock, BLOCK_SIZE_BYTES},
    heap::{HeapState, HEADER_SIZE},
    roots::RootRange,
};

/// Outcome of one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub objects_marked: usize,
    pub objects_freed: usize,
    pub bytes_freed: usize,
    pub lobs_freed: usize,
    pub blocks_recycled: usize,
    pub blocks_released: usize,
    pub elapsed: Duration,
}

/// View of the heap available to the collector
pub struct CollectorHeapView<'guard> {
    heap: &'guard mut HeapState,
    /// Header address to total size (header included) of marked objects
    live: BTreeMap<usize, usize>,
}

impl<'guard> CollectorHeapView<'guard> {
    pub fn new(heap: &'guard mut HeapState) -> Self {
        CollectorHeapView {
            heap,
            live: BTreeMap::new(),
        }
    }

    /// Clear line maps ready for marking
    pub fn reset(&mut self) {
        let heap = &mut *self.heap;
        for block in blocks_mut(
            &mut heap.head,
            &mut heap.overflow,
            &mut heap.recycled,
            &mut heap.rest,
        ) {
            block.reset_region_marks();
        }
    }

    /// Mark the object containing `candidate` if not already marked.
    /// Returns the payload range to scan when the object is newly
    /// marked and may hold references.
    pub fn mark(&mut self, candidate: usize) -> Option<(usize, usize)> {
        let (payload, len) = self.heap.find_object(candidate)?;
        let mark_state = self.heap.mark_state;

        // SAFETY: indexed objects have a valid header before the payload
        let header = unsafe { &mut *self.heap.header_of(payload).as_ptr() };
        if header.is_marked(mark_state) {
            return None;
        }

        debug_assert_eq!(header.length() as usize, len);
        header.mark(mark_state);
        self.live.insert(payload - HEADER_SIZE, HEADER_SIZE + len);

        match header.kind() {
            ObjectKind::Traced => Some((payload, len)),
            ObjectKind::Atomic => None,
        }
    }

    /// Mark everything referenced from the words of `range`, queueing
    /// newly marked traced payloads
    ///
    /// # Safety
    ///
    /// `range` must be readable.
    unsafe fn scan(&mut self, range: RootRange, grey: &mut VecDeque<(usize, usize)>) {
        for addr in range.word_addresses() {
            let word = std::ptr::read_volatile(addr as *const usize);
            if let Some(payload) = self.mark(word) {
                grey.push_back(payload);
            }
        }
    }

    /// Set line marks for every live object in the bump blocks
    fn mark_lines(&mut self) {
        let heap = &mut *self.heap;
        let live = &self.live;
        for block in blocks_mut(
            &mut heap.head,
            &mut heap.overflow,
            &mut heap.recycled,
            &mut heap.rest,
        ) {
            let base = block.base();
            for (header, size) in live.range(base..base + BLOCK_SIZE_BYTES) {
                // SAFETY: header addresses are never null
                let ptr = unsafe { NonNull::new_unchecked(*header as *mut u8) };
                block.mark_region(ptr, *size);
            }
        }
    }

    /// Drop unmarked objects from the index, free dead large objects
    /// and recycle blocks with holes
    pub fn sweep(&mut self, report: &mut CollectionReport) {
        self.mark_lines();

        let heap = &mut *self.heap;
        let live = &self.live;

        let before = heap.objects.len();
        heap.objects.retain(|payload, len| {
            let keep = live.contains_key(&(*payload - HEADER_SIZE));
            if !keep {
                report.bytes_freed += *len + HEADER_SIZE;
            }
            keep
        });
        report.objects_freed = before - heap.objects.len();

        let lobs_before = heap.lobs.len();
        heap.lobs.retain(|lob| live.range(lob.span()).next().is_some());
        report.lobs_freed = lobs_before - heap.lobs.len();

        // head and overflow keep allocating from wherever the line
        // marks now allow
        for slot in [&mut heap.head, &mut heap.overflow] {
            if slot.as_mut().map(BumpBlock::recycle) == Some(false) {
                if let Some(full) = slot.take() {
                    heap.rest.push_back(full);
                }
            }
        }

        let mut candidates = std::mem::take(&mut heap.recycled);
        candidates.append(&mut heap.rest);

        for mut block in candidates {
            if block.stats().marked == 0 {
                report.blocks_released += 1;
                drop(block);
            } else if block.recycle() {
                report.blocks_recycled += 1;
                heap.recycled.push_back(block);
            } else {
                heap.rest.push_back(block);
            }
        }
    }
}

/// All bump blocks of the heap
fn blocks_mut<'a>(
    head: &'a mut Option<BumpBlock>,
    overflow: &'a mut Option<BumpBlock>,
    recycled: &'a mut LinkedList<BumpBlock>,
    rest: &'a mut LinkedList<BumpBlock>,
) -> impl Iterator<Item = &'a mut BumpBlock> {
    head.iter_mut()
        .chain(overflow.iter_mut())
        .chain(recycled.iter_mut())
        .chain(rest.iter_mut())
}

/// Collect the heap using its registered roots plus `extra`
///
/// Callers must guarantee every range (registered or extra) is
/// readable for the duration of the call.
pub fn collect(heap: &mut HeapState, extra: &[RootRange], trace: bool) -> CollectionReport {
    let start = Instant::now();

    if trace {
        eprintln!("GC!");
    }

    let roots: Vec<RootRange> = heap.roots.iter().chain(extra.iter()).copied().collect();
    let mut report = CollectionReport::default();

    {
        let mut view = CollectorHeapView::new(heap);
        view.reset();

        let mut grey = VecDeque::default();
        for range in roots {
            unsafe { view.scan(range, &mut grey) };
        }

        while let Some((payload, len)) = grey.pop_front() {
            let range = RootRange::new(payload as *const u8, len);
            unsafe { view.scan(range, &mut grey) };
        }

        report.objects_marked = view.live.len();
        view.sweep(&mut report);
    }

    // after collection, flip mark state ready for next collection
    heap.mark_state = !heap.mark_state;

    heap.counters.collections += 1;
    heap.counters.objects_freed += report.objects_freed as u64;
    heap.counters.bytes_freed += report.bytes_freed as u64;

    report.elapsed = start.elapsed();

    if trace {
        eprintln!("Heap after sweep:\n\n{:?}", heap);
        eprintln!("{:?}", report);
    }

    report
}
