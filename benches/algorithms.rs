//! Benchmarks for rate limiting algorithms.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ratelimit_engine::{AlgorithmKind, LimiterBuilder, MonotonicClock, Quota, SweepInterval};

const KINDS: [AlgorithmKind; 5] = [
    AlgorithmKind::TokenBucket,
    AlgorithmKind::LeakyBucket,
    AlgorithmKind::FixedWindow,
    AlgorithmKind::SlidingLog,
    AlgorithmKind::SlidingWindow,
];

fn bench_algorithms(c: &mut Criterion) {
    let quota = Quota::per_second(1000).with_sub_windows(10);

    let mut group = c.benchmark_group("algorithms");

    for kind in KINDS {
        group.bench_function(kind.to_string(), |b| {
            let limiter = LimiterBuilder::new(kind, quota.clone())
                .sweep_interval(SweepInterval::Manual)
                .build()
                .unwrap();
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                black_box(limiter.allow(&(i % 100)))
            })
        });
    }

    group.finish();
}

fn bench_algorithm_comparison(c: &mut Criterion) {
    let quota = Quota::per_second(10000);

    let mut group = c.benchmark_group("algorithm_comparison");

    for num_keys in [1u64, 10, 100, 1000] {
        for kind in [AlgorithmKind::FixedWindow, AlgorithmKind::SlidingWindow] {
            group.bench_with_input(BenchmarkId::new(kind.to_string(), num_keys), &num_keys, |b, &num_keys| {
                let limiter = LimiterBuilder::new(kind, quota.clone())
                    .clock(MonotonicClock::new())
                    .build()
                    .unwrap();
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    black_box(limiter.allow(&(i % num_keys)))
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_algorithms, bench_algorithm_comparison);
criterion_main!(benches);
