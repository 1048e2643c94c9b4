//! # Graph Benchmarks
//!
//! Performance benchmarks for archgraph-core build and query operations.
//!
//! Run with: `cargo bench -p archgraph-core`

use archgraph_core::{
    CancelFlag, CouplingThresholds, DiagramSource, EngineConfig, Hierarchy, ProjectInput,
    QualifiedId, Relationship, analyze_dependencies, build_project,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::path::PathBuf;

/// One system with `size` containers, a chain of stored edges between
/// consecutive containers, and one diagram per ten containers.
fn create_project(size: usize) -> ProjectInput {
    let mut hierarchy = Hierarchy::new();
    let system = hierarchy.add_system("Bench").expect("system");
    for i in 0..size {
        hierarchy
            .add_container(&system, &format!("c{i}"))
            .expect("container");
    }

    let id = |i: usize| QualifiedId::normalize(&format!("bench/c{i}")).expect("id");
    let stored = (1..size)
        .map(|i| Relationship::new(id(i - 1), id(i), "next").expect("rel"))
        .collect();

    let diagrams = (0..size / 10)
        .map(|d| {
            let text: String = (0..10)
                .map(|k| {
                    let from = d * 10 + k;
                    format!("c{from} -> c{}: hop\n", (from * 7 + 3) % size)
                })
                .collect();
            DiagramSource {
                path: PathBuf::from(format!("src/bench/d{d:04}.d2")),
                scope: system.clone(),
                text,
            }
        })
        .collect();

    ProjectInput {
        root: PathBuf::from("bench"),
        hierarchy,
        stored,
        diagrams,
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_project");

    for size in [100, 1000].iter() {
        let input = create_project(*size);
        for workers in [1, 4] {
            let config = EngineConfig {
                workers,
                ..EngineConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), size),
                &input,
                |b, input| {
                    b.iter(|| {
                        build_project(black_box(input), &config, &CancelFlag::new())
                            .expect("build")
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    for size in [100, 1000].iter() {
        let built = build_project(
            &create_project(*size),
            &EngineConfig::default(),
            &CancelFlag::new(),
        )
        .expect("build");
        let graph = built.graph;
        let last = format!("bench/c{}", size - 1);

        group.bench_with_input(BenchmarkId::new("dependencies", size), &graph, |b, g| {
            b.iter(|| g.dependencies(black_box("bench/c0")).expect("deps"));
        });

        group.bench_with_input(BenchmarkId::new("path", size), &graph, |b, g| {
            b.iter(|| g.path(black_box("bench/c0"), black_box(&last)).expect("path"));
        });

        group.bench_with_input(BenchmarkId::new("analyze", size), &graph, |b, g| {
            b.iter(|| analyze_dependencies(black_box(g), CouplingThresholds::default()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_queries);
criterion_main!(benches);
