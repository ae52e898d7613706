//! Subscription churn and deferred fan-out run for Herald.
//!
//! Exercises many subscribe/unsubscribe cycles across isolated scopes, then a
//! deferred fan-out on a tokio runtime, and prints engine stats plus the
//! Prometheus rendering of the engine's metrics.
//!
//! ```bash
//! cargo run --release -p herald-bench --bin churn -- 100000
//! RUST_LOG=herald_core=debug cargo run -p herald-bench --bin churn -- 100
//! ```

use anyhow::{ensure, Context, Result};
use herald_bench::{payload, Payload};
use herald_core::{Callback, EngineConfig, PubSub, Topic, TokioScheduler};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SCOPES: usize = 8;
const FANOUT_SUBSCRIBERS: usize = 1_000;
const FANOUT_MESSAGES: u64 = 1_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let iterations: usize = std::env::args()
        .nth(1)
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("iterations must be a number")?
        .unwrap_or(10_000);

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let scheduler = Arc::new(TokioScheduler::new());
    let bus: PubSub<Payload> = PubSub::with_scheduler(EngineConfig::default(), scheduler);

    run_churn(&bus, iterations)?;
    run_fanout(&bus).await?;

    println!();
    println!("{}", prometheus.render());
    Ok(())
}

fn run_churn(bus: &PubSub<Payload>, iterations: usize) -> Result<()> {
    println!("Churn: {} subscribe/unsubscribe cycles over {} scopes", iterations, SCOPES);

    let scopes: Vec<_> = (0..SCOPES).map(|_| bus.isolate()).collect();
    let pattern = Topic::pattern(r"^churn\.\d+$")?;
    let start = Instant::now();

    for i in 0..iterations {
        let scope = &scopes[i % SCOPES];
        let cb = Callback::new(|_: &str, _: Option<&Payload>| {});
        scope.subscribe(format!("churn.{}", i % 64), &cb);
        scope.subscribe(&pattern, &cb);
        scope.subscribe_once("churn.once", &cb);

        match i % 3 {
            0 => {
                scope.unsubscribe_callback(&cb);
            }
            1 => {
                scope.unsubscribe_all();
            }
            _ => {
                scope.unsubscribe_topic_callback(format!("churn.{}", i % 64), &cb);
                scope.unsubscribe_topic_callback(&pattern, &cb);
                scope.publish_sync("churn.once", None);
            }
        }
    }

    let elapsed = start.elapsed();
    let stats = bus.stats();
    println!(
        "  {:.0} cycles/s, residual: {:?}",
        iterations as f64 / elapsed.as_secs_f64(),
        stats
    );
    ensure!(stats.subscription_count == 0, "churn left live subscriptions behind");
    ensure!(stats.callback_count == 0 && stats.scope_count == 0, "churn left index residue");
    Ok(())
}

async fn run_fanout(bus: &PubSub<Payload>) -> Result<()> {
    println!(
        "Fan-out: {} deferred messages to {} subscribers",
        FANOUT_MESSAGES, FANOUT_SUBSCRIBERS
    );

    let received = Arc::new(AtomicU64::new(0));
    let done = Arc::new(Notify::new());
    let expected = FANOUT_MESSAGES * FANOUT_SUBSCRIBERS as u64;

    let cb = {
        let received = Arc::clone(&received);
        let done = Arc::clone(&done);
        Callback::new(move |_: &str, _: Option<&Payload>| {
            if received.fetch_add(1, Ordering::Relaxed) + 1 == expected {
                done.notify_one();
            }
        })
    };
    let scope = bus.isolate();
    for _ in 0..FANOUT_SUBSCRIBERS {
        scope.subscribe("fanout", &cb);
    }

    let data = payload(64);
    let start = Instant::now();
    for _ in 0..FANOUT_MESSAGES {
        bus.publish("fanout", data.clone());
    }

    tokio::time::timeout(Duration::from_secs(30), done.notified())
        .await
        .context("deferred deliveries did not finish")?;

    let elapsed = start.elapsed();
    println!(
        "  {} deliveries in {:?} ({:.0} deliveries/s)",
        received.load(Ordering::Relaxed),
        elapsed,
        expected as f64 / elapsed.as_secs_f64()
    );

    scope.unsubscribe_all();
    tracing::info!(stats = ?bus.stats(), "Fan-out complete");
    Ok(())
}
