//! Benchmark comparing blind and insert-sorted indexes on range queries.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use tabledb_core::index::{create_index, IndexKey, IndexKind, IndexRange, RowSource};
use tabledb_core::types::Value;
use tabledb_core::{DbError, RowNumber};

/// In-memory rows with a single integer key column.
struct Keys(Vec<i64>);

impl RowSource for Keys {
    fn key_of(&self, row: RowNumber, _columns: &[usize]) -> Result<IndexKey, DbError> {
        Ok(IndexKey::new(vec![Value::Integer(self.0[row])]))
    }
}

fn random_keys(count: usize) -> Keys {
    let mut rng = StdRng::seed_from_u64(42);
    Keys((0..count).map(|_| rng.gen_range(0..count as i64)).collect())
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_range");
    for &size in &[1_000usize, 10_000] {
        let keys = random_keys(size);
        let rows: Vec<RowNumber> = (0..size).collect();
        let range = [IndexRange::between(
            IndexKey::single(size as i64 / 4),
            IndexKey::single(size as i64 / 2),
        )];

        for kind in [IndexKind::Blind, IndexKind::InsertSorted] {
            let mut index = create_index(kind, vec![0]);
            index.rebuild(&keys, &rows).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}/partial", kind), size),
                &size,
                |b, _| b.iter(|| black_box(index.select_range(&keys, &range).unwrap())),
            );
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}/full", kind), size),
                &size,
                |b, _| b.iter(|| black_box(index.select_all(&keys).unwrap())),
            );
        }
    }
    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let keys = random_keys(10_000);
    let mut group = c.benchmark_group("insert");
    for kind in [IndexKind::Blind, IndexKind::InsertSorted] {
        group.bench_function(format!("{:?}", kind), |b| {
            b.iter(|| {
                let mut index = create_index(kind, vec![0]);
                for row in 0..keys.0.len() {
                    index.insert(&keys, row).unwrap();
                }
                black_box(index.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_select, bench_insert);
criterion_main!(benches);
