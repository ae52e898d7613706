//! Shared fixtures for Herald benchmarks.

use bytes::Bytes;
use herald_core::{Callback, EngineConfig, ManualScheduler, PubSub, Token, Topic};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Payload type used throughout the benchmarks.
pub type Payload = Bytes;

/// An engine whose deferred deliveries are drained by hand, with metrics off.
#[must_use]
pub fn manual_bus() -> (PubSub<Payload>, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let config = EngineConfig {
        metrics_enabled: false,
        ..EngineConfig::default()
    };
    (PubSub::with_scheduler(config, Arc::clone(&scheduler)), scheduler)
}

/// A callback that counts its invocations.
#[must_use]
pub fn counter() -> (Callback<Payload>, Arc<AtomicU64>) {
    let count = Arc::new(AtomicU64::new(0));
    let c = Arc::clone(&count);
    let cb = Callback::new(move |_: &str, _: Option<&Payload>| {
        c.fetch_add(1, Ordering::Relaxed);
    });
    (cb, count)
}

/// Subscribe `n` distinct literal topics (`topic:0` ..) with one callback.
pub fn populate_literals(bus: &PubSub<Payload>, cb: &Callback<Payload>, n: usize) -> Vec<Token<Payload>> {
    (0..n)
        .filter_map(|i| bus.subscribe(format!("topic:{i}"), cb))
        .collect()
}

/// Subscribe `n` distinct prefix patterns (`^group{i}:`) with one callback.
///
/// # Panics
///
/// Panics if a generated pattern fails to compile, which cannot happen.
pub fn populate_patterns(bus: &PubSub<Payload>, cb: &Callback<Payload>, n: usize) -> Vec<Token<Payload>> {
    (0..n)
        .filter_map(|i| {
            let topic = Topic::pattern(&format!("^group{i}:")).expect("static pattern");
            bus.subscribe(topic, cb)
        })
        .collect()
}

/// A payload of `size` zero bytes.
#[must_use]
pub fn payload(size: usize) -> Payload {
    Bytes::from(vec![0u8; size])
}
