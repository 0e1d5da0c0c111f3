//! Throughput of the DR hidden timestamp codec, which runs once per replicated
//! row written.

#![forbid(unsafe_code)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::SmallRng};

use sitectx_types::dr_timestamp::{decode_cluster_id, decode_logical_clock, encode};
use sitectx_types::unique_id::{COUNTER_MAX_VALUE, TIMESTAMP_MAX_VALUE, make_id};

const N: usize = 100_000;

fn make_unique_ids(n: usize) -> Vec<i64> {
    let mut rng = SmallRng::seed_from_u64(0xC0FF_EE00_DADA_BEEF);
    (0..n)
        .map(|_| {
            make_id(
                rng.random_range(0..=TIMESTAMP_MAX_VALUE),
                rng.random_range(0..=COUNTER_MAX_VALUE),
                rng.random_range(0..1024),
            )
            .expect("in range")
        })
        .collect()
}

fn bench_dr_timestamp(c: &mut Criterion) {
    let ids = make_unique_ids(N);
    let hidden: Vec<i64> = ids.iter().map(|id| encode(3, *id)).collect();

    c.bench_function("dr_timestamp/encode", |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for id in &ids {
                acc ^= encode(black_box(3), *id);
            }
            black_box(acc);
        });
    });

    c.bench_function("dr_timestamp/decode", |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for value in &hidden {
                acc ^= decode_logical_clock(*value) ^ i64::from(decode_cluster_id(*value));
            }
            black_box(acc);
        });
    });
}

criterion_group!(benches, bench_dr_timestamp);
criterion_main!(benches);
