//! Event delivery.
//!
//! A publish resolves its callbacks once, up front, and packs them into a
//! [`DeliveryUnit`]. The unit is run inline or handed to the scheduler; in
//! both cases it delivers to exactly the callbacks captured at publish time,
//! even if subscriptions change before it runs.

use crate::callback::Callback;
use crate::metrics;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// How a publish delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Hand the delivery to the scheduler and return immediately.
    #[default]
    Deferred,
    /// Invoke every callback before `publish` returns.
    Inline,
}

impl Delivery {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Inline => "inline",
        }
    }
}

impl From<bool> for Delivery {
    /// `true` means synchronous.
    fn from(sync: bool) -> Self {
        if sync {
            Self::Inline
        } else {
            Self::Deferred
        }
    }
}

/// Outcome of running a delivery unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Callbacks invoked.
    pub delivered: usize,
    /// Callbacks that panicked.
    pub failed: usize,
}

/// One publish's worth of pending callback invocations.
pub struct DeliveryUnit<T> {
    topic: String,
    data: Option<T>,
    callbacks: Vec<Callback<T>>,
    record_metrics: bool,
}

impl<T> DeliveryUnit<T> {
    /// Create a delivery unit.
    #[must_use]
    pub fn new(topic: impl Into<String>, data: Option<T>, callbacks: Vec<Callback<T>>) -> Self {
        Self {
            topic: topic.into(),
            data,
            callbacks,
            record_metrics: false,
        }
    }

    /// Record delivery counts through the metrics facade.
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = enabled;
        self
    }

    /// Number of callbacks to invoke.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether there is nothing to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke every callback with `(topic, data)`.
    ///
    /// A panicking callback is caught and counted; the rest still run.
    pub fn run(self) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let data = self.data.as_ref();

        for callback in &self.callbacks {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                callback.call(&self.topic, data);
            }));
            report.delivered += 1;
            if outcome.is_err() {
                report.failed += 1;
            }
        }

        if self.record_metrics {
            metrics::record_deliveries(report.delivered, report.failed);
        }
        report
    }
}

impl<T> fmt::Debug for DeliveryUnit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryUnit")
            .field("topic", &self.topic)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
