//! 집계 캐시 벤치마크
//!
//! L7 정책 기준으로 ingest(병합/삽입/드롭)와 drain 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sluice_aggregator::l7::{L7Policy, L7Update};
use sluice_aggregator::{AggregationCache, Capacity};

fn create_update(i: usize) -> L7Update {
    L7Update {
        domain: "api.default".to_owned(),
        path: format!("/v1/orders/{i}?expand=items"),
        method: "GET".to_owned(),
        response_code: "200".to_owned(),
        protocol: "http/1.1".to_owned(),
        duration_ms: 12,
        duration_max_ms: 30,
        bytes_received: 2048,
        bytes_sent: 256,
        count: 1,
        ..L7Update::default()
    }
}

fn bench_ingest_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_ingest_merge");
    group.throughput(Throughput::Elements(1));

    let cache = AggregationCache::new(L7Policy::default(), Capacity::from_limit(1500));
    let update = create_update(0);
    group.bench_function("same_key", |b| {
        b.iter(|| cache.ingest(black_box(&update)))
    });
    group.finish();
}

fn bench_ingest_distinct(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_ingest_distinct");

    for capacity in [100usize, 1500, 0] {
        let updates: Vec<_> = (0..2000).map(create_update).collect();
        group.throughput(Throughput::Elements(updates.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(Capacity::from_limit(capacity)),
            &updates,
            |b, updates| {
                b.iter(|| {
                    let cache =
                        AggregationCache::new(L7Policy::default(), Capacity::from_limit(capacity));
                    for u in updates {
                        let _ = cache.ingest(black_box(u));
                    }
                    cache
                })
            },
        );
    }
    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_drain");

    for entries in [10usize, 500, 1500] {
        group.throughput(Throughput::Elements(entries as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &entries, |b, &n| {
            let cache = AggregationCache::new(L7Policy::default(), Capacity::Unbounded);
            b.iter(|| {
                for i in 0..n {
                    let _ = cache.ingest(&create_update(i));
                }
                black_box(cache.drain())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ingest_merge, bench_ingest_distinct, bench_drain);
criterion_main!(benches);
