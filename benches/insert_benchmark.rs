//! Benchmark the insertion engine's search-then-prune-then-link cost as
//! the graph grows.
//!
//! Run with: cargo bench --bench insert_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;
use vamana_diskann::file::{FileBlockDevice, IndexFile};
use vamana_diskann::insert::insert;
use vamana_diskann::vector::{ElementType, Vector};

const DIMENSIONS: usize = 128;
const N_VECTORS: usize = 2000;
const DEGREE_CAP: usize = 32;
const SEARCH_LIST_SIZE: usize = 64;
const ALPHA: f64 = 1.2;

fn generate_vectors(n: usize, dim: usize) -> Vec<Vector> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| Vector::new((0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()))
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let vectors = generate_vectors(N_VECTORS, DIMENSIONS);

    c.bench_function("insert_sequential", |b| {
        b.iter(|| {
            let dir = tempdir().unwrap();
            let device = FileBlockDevice::open(dir.path().join("idx")).unwrap();
            #[allow(clippy::cast_possible_truncation)]
            let index = IndexFile::open(device, DIMENSIONS as u16, ElementType::F32).unwrap();

            for (i, v) in vectors.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                let outcome = insert(
                    &index,
                    i as u64 + 1,
                    v.clone(),
                    DEGREE_CAP,
                    SEARCH_LIST_SIZE,
                    ALPHA,
                )
                .unwrap();
                black_box(outcome.offset);
            }
        });
    });
}

criterion_group!(benches, bench_insert);
criterion_main!(benches);
