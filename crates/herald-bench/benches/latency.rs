//! Latency benchmarks for Herald.
//!
//! These benchmarks focus on publish-to-callback latency.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use herald_bench::{counter, manual_bus, payload};
use herald_core::{Callback, EngineConfig, PubSub, ThreadScheduler};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Benchmark inline publish + delivery latency.
fn bench_inline_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline_latency");

    group.bench_function("single_subscriber", |b| {
        b.iter_custom(|iters| {
            let (bus, _) = manual_bus();
            let (cb, _) = counter();
            let _token = bus.subscribe("test", &cb).unwrap();
            let data = payload(64);

            let start = Instant::now();
            for _ in 0..iters {
                bus.publish_sync("test", data.clone());
            }
            start.elapsed()
        });
    });

    group.bench_function("subscribe_once", |b| {
        b.iter_custom(|iters| {
            let (bus, _) = manual_bus();
            let (cb, _) = counter();

            let start = Instant::now();
            for _ in 0..iters {
                bus.subscribe_once("once", &cb);
                bus.publish_sync(black_box("once"), None);
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmark deferred publish latency through the background worker.
fn bench_deferred_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("deferred_latency");

    group.bench_function("thread_scheduler", |b| {
        b.iter_custom(|iters| {
            let scheduler = Arc::new(ThreadScheduler::new("herald-bench"));
            let bus = PubSub::with_scheduler(EngineConfig::default(), scheduler);
            let (tx, rx) = mpsc::channel();
            let tx = Mutex::new(tx);
            let cb = Callback::new(move |_: &str, _: Option<&bytes::Bytes>| {
                let _ = tx.lock().map(|tx| tx.send(()));
            });
            let _token = bus.subscribe("test", &cb).unwrap();
            let data = payload(64);

            let start = Instant::now();
            for _ in 0..iters {
                bus.publish("test", data.clone());
                let _ = rx.recv();
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_inline_latency, bench_deferred_latency);
criterion_main!(benches);
