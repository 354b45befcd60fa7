//! Benchmark graph construction, coarse matching and the full pipeline.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pada_match::{CoarseMatcher, GraphBuilder, Point2D, TopologyPipeline, TreadPoint};

/// Deterministic jittered lattice, 5 columns wide.
fn outsole(n: usize, dx: f32, dy: f32) -> Vec<TreadPoint> {
    (0..n)
        .map(|i| {
            let (c, r) = ((i % 5) as f32, (i / 5) as f32);
            let jx = (i as f32 * 0.7).sin() * 8.0;
            let jy = (i as f32 * 1.3).cos() * 8.0;
            TreadPoint::new(c * 35.0 + jx + dx, r * 35.0 + jy + dy, 0.8)
        })
        .collect()
}

fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    let builder = GraphBuilder::default();

    for n in [40, 100, 200].iter() {
        let points = outsole(*n, 0.0, 0.0);
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| black_box(builder.build(black_box(&points))))
        });
    }

    group.finish();
}

fn bench_coarse_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("coarse_compare");
    let builder = GraphBuilder::default();
    let matcher = CoarseMatcher::default();

    for n in [40, 100].iter() {
        let a = builder.build(&outsole(*n, 0.0, 0.0));
        let b = builder.build(&outsole(*n, 3.0, -2.0));
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |bench, _| {
            bench.iter(|| black_box(matcher.compare(black_box(&a), black_box(&b))))
        });
    }

    group.finish();
}

fn bench_full_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_topology_merge");
    group.sample_size(20);
    let builder = GraphBuilder::default();
    let pipeline = TopologyPipeline::default();
    let shift = Point2D::new(120.0, 40.0);

    for n in [40, 80].iter() {
        let a = builder.build(&outsole(*n, 0.0, 0.0));
        let b = builder.build(&outsole(*n, shift.x, shift.y));
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |bench, _| {
            bench.iter(|| black_box(pipeline.full_topology_merge(&a, &b, None)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_graph_build,
    bench_coarse_compare,
    bench_full_merge
);
criterion_main!(benches);
