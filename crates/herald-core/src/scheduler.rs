//! Deferred execution for asynchronous delivery.
//!
//! The engine hands each deferred delivery to a [`Scheduler`] and returns
//! immediately. Schedulers run tasks later, first-scheduled-first-run, with
//! no ordering guarantee relative to unrelated work on the same executor.
//!
//! - [`ThreadScheduler`] - a dedicated background thread (the default)
//! - [`TokioScheduler`] - a task on a tokio runtime
//! - [`ManualScheduler`] - a queue drained by the caller, for tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks at some later point.
pub trait Scheduler: Send + Sync {
    /// Schedule a task. Must not run it inline.
    fn defer(&self, task: Task);
}

// A panicking task must not take the worker down with it.
fn run_task(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        warn!("Deferred task panicked");
    }
}

/// Scheduler backed by a dedicated OS thread.
///
/// The worker exits once the scheduler is dropped and the queue drains.
#[derive(Debug)]
pub struct ThreadScheduler {
    sender: mpsc::UnboundedSender<Task>,
}

impl ThreadScheduler {
    /// Start a worker thread with the given name.
    ///
    /// If the thread cannot be spawned the failure is logged and every
    /// deferred task is dropped with a warning. Use [`ThreadScheduler::try_spawn`]
    /// to handle the error instead.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        let name = name.into();
        if let Err(e) = Self::start_worker(name.clone(), receiver) {
            error!(worker = %name, error = %e, "Failed to start deferred worker");
        }
        Self { sender }
    }

    /// Start a worker thread with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn try_spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel::<Task>();
        Self::start_worker(name.into(), receiver)?;
        Ok(Self { sender })
    }

    fn start_worker(name: String, mut receiver: mpsc::UnboundedReceiver<Task>) -> std::io::Result<()> {
        std::thread::Builder::new().name(name.clone()).spawn(move || {
            debug!(worker = %name, "Deferred worker started");
            while let Some(task) = receiver.blocking_recv() {
                run_task(task);
            }
            debug!(worker = %name, "Deferred worker stopped");
        })?;
        Ok(())
    }
}

impl Scheduler for ThreadScheduler {
    fn defer(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("Deferred worker is gone, dropping task");
        }
    }
}

/// Scheduler backed by a task on a tokio runtime.
///
/// Tasks run one after another on a single spawned task, which keeps
/// first-scheduled-first-run ordering.
#[derive(Debug)]
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<Task>,
}

impl TokioScheduler {
    /// Spawn the worker on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handle(&Handle::current())
    }

    /// Spawn the worker on a specific runtime.
    #[must_use]
    pub fn with_handle(handle: &Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Task>();

        handle.spawn(async move {
            while let Some(task) = receiver.recv().await {
                run_task(task);
                tokio::task::yield_now().await;
            }
        });

        Self { sender }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        if self.sender.send(task).is_err() {
            warn!("Deferred task is gone, dropping task");
        }
    }
}

/// Scheduler that queues tasks until [`ManualScheduler::run_pending`] is called.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks until the queue is empty, including tasks queued
    /// while running. Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run without it: tasks may schedule more.
            let next = self.queue.lock().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.queue.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc as std_mpsc, Arc};
    use std::time::Duration;

    #[test]
    fn test_manual_scheduler_defers() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        scheduler.defer(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_scheduler_fifo_and_nested() {
        let scheduler = Arc::new(ManualScheduler::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            let inner_sched = Arc::clone(&scheduler);
            scheduler.defer(Box::new(move || {
                order.lock().push(i);
                if i == 0 {
                    let order = Arc::clone(&order);
                    inner_sched.defer(Box::new(move || order.lock().push(99)));
                }
            }));
        }

        assert_eq!(scheduler.run_pending(), 4);
        assert_eq!(*order.lock(), vec![0, 1, 2, 99]);
    }

    #[test]
    fn test_thread_scheduler_runs_in_order() {
        let scheduler = ThreadScheduler::try_spawn("herald-test").unwrap();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            scheduler.defer(Box::new(move || {
                let name = std::thread::current().name().map(str::to_string);
                tx.send((i, name)).unwrap();
            }));
        }

        for expected in 0..5 {
            let (i, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(i, expected);
            assert_eq!(name.as_deref(), Some("herald-test"));
        }
    }

    #[test]
    fn test_thread_scheduler_survives_panicking_task() {
        let scheduler = ThreadScheduler::try_spawn("herald-panic").unwrap();
        let (tx, rx) = std_mpsc::channel();

        scheduler.defer(Box::new(|| panic!("task failed")));
        scheduler.defer(Box::new(move || tx.send(7).unwrap()));

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_survives_panicking_task() {
        let scheduler = TokioScheduler::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        scheduler.defer(Box::new(|| panic!("task failed")));
        scheduler.defer(Box::new(move || tx.send(7).unwrap()));

        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_tokio_scheduler_runs_tasks() {
        let scheduler = TokioScheduler::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..3 {
            let tx = tx.clone();
            scheduler.defer(Box::new(move || {
                tx.send(i).unwrap();
            }));
        }

        for expected in 0..3 {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }
}
