//! Benchmarks for the triangulation pipeline
//!
//! Measures unconstrained Delaunay construction on random point sets and the
//! full constrained pipeline on glyph-like outlines with holes.

#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use glyphmesh::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::hint::black_box;

fn generate_random_points(n_points: usize, seed: u64) -> Vec<Point2> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_points)
        .map(|_| {
            Point2::new(
                rng.random_range(0.0..1000.0),
                rng.random_range(0.0..1000.0),
            )
        })
        .collect()
}

/// Rectangle of `columns x rows` square holes, hull counter-clockwise and holes
/// clockwise.
fn generate_perforated_outline(columns: usize, rows: usize) -> (Vec<Point2>, Vec<Vec<Point2>>) {
    #[allow(clippy::cast_precision_loss)]
    let (width, height) = ((columns * 3 + 1) as f64, (rows * 3 + 1) as f64);
    let hull = vec![
        Point2::new(0.0, 0.0),
        Point2::new(width, 0.0),
        Point2::new(width, height),
        Point2::new(0.0, height),
    ];
    let mut holes = Vec::with_capacity(columns * rows);
    for i in 0..columns {
        for j in 0..rows {
            #[allow(clippy::cast_precision_loss)]
            let (x, y) = ((i * 3 + 1) as f64, (j * 3 + 1) as f64);
            holes.push(vec![
                Point2::new(x, y),
                Point2::new(x, y + 2.0),
                Point2::new(x + 2.0, y + 2.0),
                Point2::new(x + 2.0, y),
            ]);
        }
    }
    (hull, holes)
}

fn benchmark_random_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("delaunay_random_points");
    for &n_points in &[100_usize, 1_000, 5_000] {
        let points = generate_random_points(n_points, 42);
        group.throughput(Throughput::Elements(n_points as u64));
        for (name, hint) in [
            ("last_inserted", HintStrategy::LastInserted),
            ("seeded", HintStrategy::Seeded(7)),
        ] {
            let options = TriangulationOptionsBuilder::default()
                .hint(hint)
                .build()
                .unwrap();
            group.bench_with_input(BenchmarkId::new(name, n_points), &points, |b, points| {
                b.iter(|| black_box(triangulate_points(points, options).unwrap()));
            });
        }
    }
    group.finish();
}

fn benchmark_outline_with_holes(c: &mut Criterion) {
    let mut group = c.benchmark_group("constrained_outline");
    for &side in &[2_usize, 5, 10] {
        let (hull, holes) = generate_perforated_outline(side, side);
        group.throughput(Throughput::Elements((side * side) as u64));
        group.bench_with_input(
            BenchmarkId::new("square_holes", side * side),
            &(hull, holes),
            |b, (hull, holes)| {
                b.iter(|| {
                    black_box(
                        ConstrainedTriangulation::new(
                            &[],
                            hull,
                            holes,
                            TriangulationOptions::default(),
                        )
                        .unwrap(),
                    )
                });
            },
        );
    }
    group.finish();
}

fn benchmark_indexed_mesh(c: &mut Criterion) {
    let (hull, holes) = generate_perforated_outline(5, 5);
    let cdt = ConstrainedTriangulation::new(&[], &hull, &holes, TriangulationOptions::default())
        .unwrap();
    c.bench_function("indexed_mesh_5x5", |b| {
        b.iter(|| black_box(cdt.indexed_mesh(0.0, UpAxis::Z).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_random_points,
    benchmark_outline_with_holes,
    benchmark_indexed_mesh
);
criterion_main!(benches);
