//! Performance benchmarks for lrs-lib
//!
//! Run with: cargo bench --package lrs-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use geo::{LineString, Point};
use lrs_lib::{Config, LineFeature, Lrs, PointFeature};

/// Generate a wavy route made of `num_lines` connected lines of 10 vertices each
fn generate_route_lines(route_id: &str, first_id: u64, num_lines: usize, offset_y: f64) -> Vec<LineFeature> {
    (0..num_lines)
        .map(|i| {
            let coords: Vec<(f64, f64)> = (0..10)
                .map(|j| {
                    let x = (i * 9 + j) as f64 * 10.0;
                    (x, offset_y + (x / 50.0).sin() * 5.0)
                })
                .collect();
            LineFeature::single(first_id + i as u64, route_id, LineString::from(coords))
        })
        .collect()
}

/// Generate milestones every `spacing` units with every `wrong_every`-th measure misplaced
fn generate_milestones(
    route_id: &str,
    first_id: u64,
    count: usize,
    spacing: f64,
    offset_y: f64,
    wrong_every: usize,
) -> Vec<PointFeature> {
    (0..count)
        .map(|i| {
            let x = i as f64 * spacing;
            let measure = if wrong_every > 0 && i % wrong_every == wrong_every - 1 {
                (count - i) as f64
            } else {
                i as f64
            };
            let y = offset_y + (x / 50.0).sin() * 5.0 + 1.0;
            PointFeature::single(first_id + i as u64, route_id, measure, Point::new(x, y))
        })
        .collect()
}

// ============================================================================
// Core Benchmarks - Key performance indicators
// ============================================================================

fn bench_calibration(c: &mut Criterion) {
    let mut group = c.benchmark_group("calibration");
    group.sample_size(20);

    // Single route, varying number of milestones (scoring is cubic in the worst case)
    for milestones in [10usize, 50, 200] {
        let lines = generate_route_lines("R", 0, 100, 0.0);
        let points = generate_milestones("R", 10_000, milestones, 8900.0 / milestones as f64, 0.0, 7);

        group.throughput(Throughput::Elements(milestones as u64));
        group.bench_with_input(BenchmarkId::new("single_route", milestones), &milestones, |b, _| {
            b.iter(|| Lrs::build(Config::default(), lines.clone(), points.clone()));
        });
    }

    group.finish();
}

fn bench_many_routes(c: &mut Criterion) {
    let mut group = c.benchmark_group("many_routes");
    group.sample_size(10);

    // 100 routes with 20 lines and 30 milestones each
    let mut lines = Vec::new();
    let mut points = Vec::new();
    for r in 0..100u64 {
        let route_id = format!("R{r}");
        let offset_y = r as f64 * 1_000.0;
        lines.extend(generate_route_lines(&route_id, r * 1_000, 20, offset_y));
        points.extend(generate_milestones(&route_id, 500_000 + r * 1_000, 30, 50.0, offset_y, 5));
    }

    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("100_routes_30_milestones", |b| {
        b.iter(|| Lrs::build(Config::default(), lines.clone(), points.clone()));
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let lines = generate_route_lines("R", 0, 100, 0.0);
    let points = generate_milestones("R", 10_000, 100, 89.0, 0.0, 0);
    let lrs = Lrs::build(Config::default(), lines, points);

    group.bench_function("point_at_measure", |b| {
        b.iter(|| lrs.point_at_measure("R", 42.5));
    });

    group.bench_function("segment_geometry", |b| {
        b.iter(|| lrs.segment_geometry("R", 10.5, 60.5));
    });

    group.bench_function("segments", |b| {
        b.iter(|| lrs.segments());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_calibration, bench_many_routes, bench_queries);

criterion_main!(benches);
