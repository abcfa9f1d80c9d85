//! GC collection benchmarks
//!
//! Allocation followed by collection, collection with varying survivor
//! ratios, and allocation into recycled blocks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use duck_runtime::memory::{alloc::ObjectKind, heap::Heap, roots::RootRange};
use std::hint::black_box;

/// Allocate n traced objects, each pointing at the one before
fn allocate_chain(heap: &Heap, n: usize) -> Vec<usize> {
    let mut previous = 0usize;
    (0..n)
        .map(|_| {
            let ptr = heap.alloc_bytes(32, ObjectKind::Traced).unwrap();
            unsafe { (ptr.as_ptr() as *mut usize).write(previous) };
            previous = ptr.as_ptr() as usize;
            previous
        })
        .collect()
}

/// Benchmark: allocate objects then collect with no survivors
fn bench_alloc_then_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_alloc_then_collect");

    for count in [256, 1024, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let heap = Heap::new();
                let _ptrs = allocate_chain(&heap, count);
                black_box(heap.collect())
            })
        });
    }

    group.finish();
}

/// Benchmark: collect with varying percentage of survivors
fn bench_collect_with_survivors(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_collect_with_survivors");

    for survivor_pct in [0, 25, 50, 75, 100] {
        group.bench_with_input(
            BenchmarkId::new("pct", survivor_pct),
            &survivor_pct,
            |b, &pct| {
                b.iter(|| {
                    let heap = Heap::new();
                    let total = 2048;
                    // unchained so that only rooted objects survive
                    let mut roots: Vec<usize> = (0..total)
                        .map(|_| heap.alloc_bytes(32, ObjectKind::Atomic).unwrap().as_ptr() as usize)
                        .collect();
                    roots.truncate(total * pct / 100);
                    black_box(unsafe { heap.collect_with(&[RootRange::from_slice(&roots[..])]) })
                })
            },
        );
    }

    group.finish();
}

/// Benchmark: allocate into blocks recycled by a previous collection
fn bench_alloc_into_recycled(c: &mut Criterion) {
    c.bench_function("gc_alloc_into_recycled", |b| {
        b.iter(|| {
            let heap = Heap::new();
            let ptrs = allocate_chain(&heap, 4096);
            let survivors: Vec<usize> = ptrs.iter().step_by(64).copied().collect();
            // survivors only: break the chain first
            for s in &survivors {
                unsafe { (*s as *mut usize).write(0) };
            }
            unsafe { heap.collect_with(&[RootRange::from_slice(&survivors[..])]) };
            black_box(allocate_chain(&heap, 4096))
        })
    });
}

criterion_group!(
    benches,
    bench_alloc_then_collect,
    bench_collect_with_survivors,
    bench_alloc_into_recycled
);
criterion_main!(benches);
