//! Throughput benchmarks for Herald.
//!
//! These benchmarks measure the raw cost of registry and dispatch operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use herald_bench::{counter, manual_bus, payload, populate_literals, populate_patterns};
use herald_core::Topic;

/// Benchmark subscription churn.
fn bench_subscribe(c: &mut Criterion) {
    let mut group = c.benchmark_group("subscribe");

    group.bench_function("literal", |b| {
        let (bus, _) = manual_bus();
        let (cb, _) = counter();
        let mut i = 0u64;
        b.iter(|| {
            let topic = format!("topic:{}", i);
            i += 1;
            let _ = bus.subscribe(topic, &cb);
        });
    });

    group.bench_function("subscribe_unsubscribe", |b| {
        let (bus, _) = manual_bus();
        let (cb, _) = counter();
        b.iter(|| {
            if let Some(token) = bus.subscribe(black_box("churn"), &cb) {
                token.unsubscribe();
            }
        });
    });

    group.bench_function("pattern", |b| {
        let (bus, _) = manual_bus();
        let (cb, _) = counter();
        let pattern = Topic::pattern(r"^orders\.\d+$").unwrap();
        b.iter(|| {
            if let Some(token) = bus.subscribe(&pattern, &cb) {
                token.unsubscribe();
            }
        });
    });

    group.finish();
}

/// Benchmark inline publish against registries of different shapes.
fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let data = payload(64);

    group.bench_function("1_sub", |b| {
        let (bus, _) = manual_bus();
        let (cb, _) = counter();
        let _token = bus.subscribe("test", &cb).unwrap();

        b.iter(|| bus.publish_sync(black_box("test"), data.clone()));
    });

    group.bench_function("unmatched", |b| {
        let (bus, _) = manual_bus();
        let (cb, _) = counter();
        let _tokens = populate_literals(&bus, &cb, 100);

        b.iter(|| bus.publish_sync(black_box("nobody"), data.clone()));
    });

    group.bench_function("deferred_1_sub", |b| {
        let (bus, scheduler) = manual_bus();
        let (cb, _) = counter();
        let _token = bus.subscribe("test", &cb).unwrap();

        b.iter(|| {
            bus.publish(black_box("test"), data.clone());
            scheduler.run_pending()
        });
    });

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("registry_keys", size), size, |b, &size| {
            let (bus, _) = manual_bus();
            let (cb, _) = counter();
            let _literals = populate_literals(&bus, &cb, size);
            let _patterns = populate_patterns(&bus, &cb, size);

            b.iter(|| bus.publish_sync(black_box("group0:event"), data.clone()));
        });
    }

    group.finish();
}

/// Benchmark fan-out scenarios.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    let data = payload(64);

    for size in [10, 100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (bus, _) = manual_bus();
            let _tokens: Vec<_> = (0..size)
                .filter_map(|_| {
                    let (cb, _) = counter();
                    bus.subscribe("broadcast", &cb)
                })
                .collect();

            b.iter(|| bus.publish_sync(black_box("broadcast"), data.clone()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_subscribe, bench_publish, bench_fanout);
criterion_main!(benches);
