//! Benchmark greedy best-first search over a pre-built graph.
//!
//! Run with: cargo bench --bench search_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;
use vamana_diskann::file::{FileBlockDevice, IndexFile};
use vamana_diskann::insert::insert;
use vamana_diskann::search::search;
use vamana_diskann::vector::{ElementType, Vector};

const DIMENSIONS: usize = 128;
const N_VECTORS: usize = 5000;
const DEGREE_CAP: usize = 32;
const SEARCH_LIST_SIZE: usize = 64;
const ALPHA: f64 = 1.2;
const K: usize = 10;

fn generate_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Vector::new((0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()))
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let device = FileBlockDevice::open(dir.path().join("idx")).unwrap();
    #[allow(clippy::cast_possible_truncation)]
    let index = IndexFile::open(device, DIMENSIONS as u16, ElementType::F32).unwrap();

    let vectors = generate_vectors(N_VECTORS, DIMENSIONS, 7);
    for (i, v) in vectors.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        insert(&index, i as u64 + 1, v.clone(), DEGREE_CAP, SEARCH_LIST_SIZE, ALPHA).unwrap();
    }

    let queries = generate_vectors(50, DIMENSIONS, 99);

    let mut group = c.benchmark_group("greedy_search");
    group.bench_function("search_top_k", |b| {
        b.iter(|| {
            for q in &queries {
                let results = search(&index, q, SEARCH_LIST_SIZE, K).unwrap();
                black_box(&results);
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
