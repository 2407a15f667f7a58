//! # Zone Allocator Benchmark
//!
//! Budget targets for the simulation loop:
//! - Steady-state allocate/free pair well under a microsecond
//! - Tag sweep proportional to block count, not arena size
//!
//! Run with: `cargo bench --package pyre_memory`

// Benchmarks don't need docs and may have intentionally unused code
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pyre_memory::Zone;

/// Arena size for every benchmark zone.
const ZONE_BYTES: usize = 8 * 1024 * 1024;

/// Benchmark: allocate/free pair at steady state.
fn bench_alloc_free_churn(c: &mut Criterion) {
    c.bench_function("alloc_free_churn_256b", |b| {
        let mut zone = Zone::new(ZONE_BYTES).unwrap();
        b.iter(|| {
            let handle = zone.allocate(black_box(256), 1).unwrap();
            zone.free(handle).unwrap();
        });
    });
}

/// Benchmark: next-fit search that has to walk the whole ring.
fn bench_next_fit_wrap_search(c: &mut Criterion) {
    c.bench_function("next_fit_wrap_search", |b| {
        let mut zone = Zone::new(256 * 1024).unwrap();
        // One large hole at the front, everything behind it pinned. The
        // rover parks past the pinned run, so each search walks the full
        // ring and wraps before it can land in the hole.
        let front = zone.allocate(4096, 1).unwrap();
        while zone.allocate(512, 2).is_ok() {}
        zone.free(front).unwrap();
        b.iter(|| {
            let handle = zone.allocate(black_box(4096), 3).unwrap();
            zone.free(handle).unwrap();
        });
    });
}

/// Benchmark: releasing one subsystem's blocks in a single sweep.
fn bench_tag_sweep(c: &mut Criterion) {
    c.bench_function("tag_sweep_512_blocks", |b| {
        b.iter_batched(
            || {
                let mut zone = Zone::new(ZONE_BYTES).unwrap();
                for index in 0..1024 {
                    let tag = if index % 2 == 0 { 1 } else { 2 };
                    zone.allocate(256, tag).unwrap();
                }
                zone
            },
            |mut zone| {
                let freed = zone.free_all_with_tag(1).unwrap();
                black_box(freed)
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: full heap validation across a populated ring.
fn bench_check_heap(c: &mut Criterion) {
    c.bench_function("check_heap_1024_blocks", |b| {
        let mut zone = Zone::new(ZONE_BYTES).unwrap();
        for _ in 0..1024 {
            zone.allocate(512, 1).unwrap();
        }
        b.iter(|| zone.check_heap().unwrap());
    });
}

criterion_group!(
    benches,
    bench_alloc_free_churn,
    bench_next_fit_wrap_search,
    bench_tag_sweep,
    bench_check_heap
);
criterion_main!(benches);
