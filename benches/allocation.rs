//! Benchmarks for first-fit allocation, reuse and shrink

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use heapfile_rs::HeapFile;
use tempfile::TempDir;

fn benchmark_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_append");

    for count in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let temp = TempDir::new().unwrap();
                let mut heap = HeapFile::open(temp.path().join("bench.hpf")).unwrap();
                for i in 0..count {
                    black_box(heap.allocate(16, i as i64).unwrap());
                }
                heap.close().unwrap();
            });
        });
    }

    group.finish();
}

fn benchmark_first_fit_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_first_fit");

    // Worst case for first-fit: the only fitting hole is at the end of the directory
    for blocks in [100, 1000, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(blocks), blocks, |b, &blocks| {
            let temp = TempDir::new().unwrap();
            let mut heap = HeapFile::open(temp.path().join("bench.hpf")).unwrap();
            for i in 0..blocks {
                let h = heap.allocate(8, i as i64).unwrap();
                if i % 2 == 0 {
                    heap.free(&h).unwrap();
                }
            }
            let hole = heap.allocate(64, -1).unwrap();
            heap.allocate(8, -2).unwrap();
            heap.free(&hole).unwrap();

            b.iter(|| {
                let h = heap.allocate(64, 0).unwrap();
                heap.free(black_box(&h)).unwrap();
            });

            heap.close().unwrap();
        });
    }

    group.finish();
}

fn benchmark_shrink_cascade(c: &mut Criterion) {
    c.bench_function("shrink_cascade_1000", |b| {
        b.iter(|| {
            let temp = TempDir::new().unwrap();
            let mut heap = HeapFile::open(temp.path().join("bench.hpf")).unwrap();
            let handles: Vec<_> = (0..1000).map(|i| heap.allocate(4, i).unwrap()).collect();
            for h in &handles {
                heap.free(h).unwrap();
            }
            black_box(heap.shrink().unwrap());
            heap.close().unwrap();
        });
    });
}

criterion_group!(
    benches,
    benchmark_append,
    benchmark_first_fit_reuse,
    benchmark_shrink_cascade
);
criterion_main!(benches);
