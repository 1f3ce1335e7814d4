//! Benchmarks for prefix-tree operations.

use std::collections::HashMap;
use std::sync::Mutex;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use preftree::Tree;
use rayon::prelude::*;

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");

    for size in [1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("Tree", size), &size, |b, &size| {
            b.iter(|| {
                let tree = Tree::new();
                for i in 1..=size {
                    tree.root().at(i).set_value(i as i64);
                }
                black_box(tree)
            });
        });

        group.bench_with_input(BenchmarkId::new("Mutex<HashMap>", size), &size, |b, &size| {
            b.iter(|| {
                let map: Mutex<HashMap<u64, i64>> = Mutex::new(HashMap::new());
                for i in 1..=size {
                    map.lock().unwrap().insert(i, i as i64);
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for size in [1_000u64, 10_000, 100_000] {
        let tree = Tree::new();
        let map: Mutex<HashMap<u64, i64>> = Mutex::new(HashMap::new());
        for i in 1..=size {
            tree.root().at(i).set_value(i as i64);
            map.lock().unwrap().insert(i, i as i64);
        }

        group.bench_with_input(BenchmarkId::new("Tree", size), &size, |b, &size| {
            b.iter(|| {
                let mut sum = 0i64;
                for i in 1..=size {
                    sum += tree.root().at(i).value();
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("Mutex<HashMap>", size), &size, |b, &size| {
            b.iter(|| {
                let mut sum = 0i64;
                let map = map.lock().unwrap();
                for i in 1..=size {
                    sum += map[&i];
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_deep_descent(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_descent");

    let tree = Tree::new();
    let path: Vec<u64> = (1..=16).collect();
    let mut node = tree.root();
    for &symbol in &path {
        node = node.at(symbol);
    }

    group.bench_function("depth_16_existing", |b| {
        b.iter(|| {
            let mut node = tree.root();
            for &symbol in &path {
                node = node.at(symbol);
            }
            black_box(node.value())
        });
    });

    group.finish();
}

fn bench_contended_increment(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_increment");
    group.sample_size(10);

    for threads in [2usize, 4, 8] {
        let tree = Tree::new();
        for i in 1..=1_024u64 {
            tree.root().at(i);
        }

        group.bench_with_input(BenchmarkId::new("flat_1024", threads), &threads, |b, &threads| {
            b.iter(|| {
                (0..threads).into_par_iter().for_each(|_| {
                    for i in 1..=1_024u64 {
                        tree.root().at(i).inc_value();
                    }
                });
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_deep_descent,
    bench_contended_increment
);
criterion_main!(benches);
