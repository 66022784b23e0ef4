//! Micro-operation benchmarks for all cache backends.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency for get, put, and the check-then-compute
//! path across backends under identical conditions, plus canonical set
//! lookups.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use refcache::ds::CanonicalSet;
use refcache::policy::bounded::BoundedCache;
use refcache::policy::chained::ChainedCache;
use refcache::policy::soft::SoftCache;
use refcache::policy::weak::WeakCache;
use refcache::reclaim::Tracked;
use refcache::traits::ObjectCache;

const CAPACITY: usize = 16_384;
const OPS: u64 = 100_000;

fn filled<C: ObjectCache<u64, Tracked<u64>>>(cache: C) -> (C, Vec<Arc<Tracked<u64>>>) {
    // Values are held here so weak entries stay live.
    let values: Vec<_> = (0..CAPACITY as u64)
        .map(|i| Arc::new(Tracked::new(i)))
        .collect();
    for (i, value) in values.iter().enumerate() {
        cache.put(i as u64, Arc::clone(value));
    }
    (cache, values)
}

fn time_gets<C: ObjectCache<u64, Tracked<u64>>>(cache: &C, iters: u64) -> std::time::Duration {
    let start = Instant::now();
    for _ in 0..iters {
        for i in 0..OPS {
            let key = i % (CAPACITY as u64);
            black_box(cache.get(&key));
        }
    }
    start.elapsed()
}

// ============================================================================
// Get Hit Latency
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("bounded", |b| {
        let (cache, _values) = filled(BoundedCache::new(CAPACITY));
        b.iter_custom(|iters| time_gets(&cache, iters))
    });

    group.bench_function("soft", |b| {
        let (cache, _values) = filled(SoftCache::new());
        b.iter_custom(|iters| time_gets(&cache, iters))
    });

    group.bench_function("weak", |b| {
        let (cache, _values) = filled(WeakCache::new());
        b.iter_custom(|iters| time_gets(&cache, iters))
    });

    group.bench_function("chained", |b| {
        let (cache, _values) = filled(ChainedCache::new(
            BoundedCache::new(CAPACITY / 4),
            SoftCache::new(),
        ));
        b.iter_custom(|iters| time_gets(&cache, iters))
    });

    group.finish();
}

// ============================================================================
// Put Latency
// ============================================================================

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("bounded", |b| {
        b.iter_custom(|iters| {
            let cache = BoundedCache::new(CAPACITY);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache.put(i % (CAPACITY as u64 * 2), Arc::new(i));
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("soft_limited", |b| {
        b.iter_custom(|iters| {
            let cache = SoftCache::with_soft_limit(CAPACITY);
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    cache.put(i % (CAPACITY as u64 * 2), Arc::new(i));
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Mixed Workload (random keys, get-or-compute)
// ============================================================================

fn bench_get_or_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_or_insert");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("bounded", |b| {
        b.iter_custom(|iters| {
            let cache: BoundedCache<u64, u64> = BoundedCache::new(CAPACITY);
            let mut rng = SmallRng::seed_from_u64(42);
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..OPS {
                    let key = rng.random_range(0..CAPACITY as u64 * 2);
                    let value = cache
                        .get_or_try_insert_with(key, || Ok::<_, ()>(Arc::new(key * 2)))
                        .unwrap_or_else(|_| Arc::new(0));
                    black_box(value);
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("soft", |b| {
        b.iter_custom(|iters| {
            let cache: SoftCache<u64, u64> = SoftCache::with_soft_limit(CAPACITY);
            let mut rng = SmallRng::seed_from_u64(42);
            let start = Instant::now();
            for _ in 0..iters {
                for _ in 0..OPS {
                    let key = rng.random_range(0..CAPACITY as u64 * 2);
                    let value = cache
                        .get_or_try_insert_with(key, || Ok::<_, ()>(Arc::new(key * 2)))
                        .unwrap_or_else(|_| Arc::new(0));
                    black_box(value);
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

// ============================================================================
// Canonical Set
// ============================================================================

fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("unique_hit", |b| {
        let set = CanonicalSet::new();
        let held: Vec<_> = (0..1_024u64).map(|i| set.intern(Tracked::new(i))).collect();
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(set.unique(Arc::new(Tracked::new(i % 1_024))));
                }
            }
            start.elapsed()
        });
        drop(held);
    });

    group.bench_function("get", |b| {
        let set = CanonicalSet::new();
        let held: Vec<_> = (0..1_024u64).map(|i| set.intern(Tracked::new(i))).collect();
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS {
                    black_box(set.get(&(i % 2_048)));
                }
            }
            start.elapsed()
        });
        drop(held);
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_put,
    bench_get_or_insert,
    bench_canonical
);
criterion_main!(benches);
