//! Metrics instrumentation for Herald.
//!
//! Uses the `metrics` crate facade. The library never installs a recorder;
//! embedders choose an exporter.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const PUBLISHED_TOTAL: &str = "herald_published_total";
    pub const PUBLISH_UNMATCHED_TOTAL: &str = "herald_publish_unmatched_total";
    pub const DELIVERIES_TOTAL: &str = "herald_deliveries_total";
    pub const DELIVERY_FAILURES_TOTAL: &str = "herald_delivery_failures_total";
    pub const SUBSCRIPTIONS_TOTAL: &str = "herald_subscriptions_total";
    pub const SUBSCRIPTIONS_ACTIVE: &str = "herald_subscriptions_active";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::PUBLISHED_TOTAL,
        "Total number of publishes that matched at least one subscriber"
    );
    metrics::describe_counter!(
        names::PUBLISH_UNMATCHED_TOTAL,
        "Total number of publishes that matched no subscriber"
    );
    metrics::describe_counter!(names::DELIVERIES_TOTAL, "Total callback invocations");
    metrics::describe_counter!(
        names::DELIVERY_FAILURES_TOTAL,
        "Total callback invocations that panicked"
    );
    metrics::describe_counter!(
        names::SUBSCRIPTIONS_TOTAL,
        "Total number of subscriptions created"
    );
    metrics::describe_gauge!(
        names::SUBSCRIPTIONS_ACTIVE,
        "Current number of live subscriptions"
    );
}

/// Record a matched publish.
pub fn record_publish(delivery: &'static str) {
    counter!(names::PUBLISHED_TOTAL, "delivery" => delivery).increment(1);
}

/// Record a publish with no matching subscriber.
pub fn record_unmatched() {
    counter!(names::PUBLISH_UNMATCHED_TOTAL).increment(1);
}

/// Record the outcome of one delivery unit.
pub fn record_deliveries(delivered: usize, failed: usize) {
    counter!(names::DELIVERIES_TOTAL).increment(delivered as u64);
    if failed > 0 {
        counter!(names::DELIVERY_FAILURES_TOTAL).increment(failed as u64);
    }
}

/// Record a new subscription.
pub fn record_subscription() {
    counter!(names::SUBSCRIPTIONS_TOTAL).increment(1);
}

/// Update the live subscription gauge.
pub fn set_active_subscriptions(count: usize) {
    gauge!(names::SUBSCRIPTIONS_ACTIVE).set(count as f64);
}
