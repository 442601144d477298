//! Benchmarks for invalidation waves.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quarry_reactive::{compute, Dependencies, Graph, Node};

/// Builds a chain of `len` nodes, each adding one to its parent.
fn build_chain(len: usize) -> (Graph, Node<u64>, Node<u64>) {
    let graph = Graph::new();
    let root = graph.constant("root", 0u64);
    let mut tail = root;
    for i in 0..len {
        tail = graph
            .add(
                format!("link{}", i),
                compute(|deps, _| Ok(deps.get::<u64>("parent")? + 1)),
                Dependencies::new().value("parent", tail),
            )
            .unwrap();
    }
    graph.get(tail).unwrap();
    (graph, root, tail)
}

/// Builds a root with `width` direct dependents.
fn build_fan(width: usize) -> (Graph, Node<u64>) {
    let graph = Graph::new();
    let root = graph.constant("root", 0u64);
    for i in 0..width {
        let leaf = graph
            .add(
                format!("leaf{}", i),
                compute(|deps, _| Ok(deps.get::<u64>("root")? + 1)),
                Dependencies::new().value("root", root),
            )
            .unwrap();
        graph.get(leaf).unwrap();
    }
    (graph, root)
}

fn chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate_chain");
    for len in [10usize, 100, 1000].iter() {
        let (graph, root, tail) = build_chain(*len);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                graph.invalidate(root).unwrap();
                black_box(graph.get(tail).unwrap())
            })
        });
    }
    group.finish();
}

fn fan_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate_fan");
    for width in [10usize, 100, 1000].iter() {
        let (graph, root) = build_fan(*width);
        group.bench_with_input(BenchmarkId::from_parameter(width), width, |b, _| {
            b.iter(|| graph.invalidate(black_box(root)).unwrap())
        });
    }
    group.finish();
}

fn memoized_read_benchmark(c: &mut Criterion) {
    let (graph, _, tail) = build_chain(100);
    c.bench_function("memoized_read_chain_100", |b| {
        b.iter(|| black_box(graph.get(tail).unwrap()))
    });
}

criterion_group!(
    benches,
    chain_benchmark,
    fan_benchmark,
    memoized_read_benchmark
);
criterion_main!(benches);
