//! Ordered, single-flight task queue.
//!
//! At most one work unit runs at a time and units run in submission order.
//! The queue is a two-state machine: [`QueuePhase::Idle`] while nothing is
//! pending, [`QueuePhase::Draining`] while a consumption loop runs. The first
//! submission in an idle period starts the loop; the loop returns to idle only
//! after it observes an empty queue under the same lock that `submit` takes.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

/// One queued asynchronous action.
///
/// The action captures everything it needs when it is built; the queue only
/// calls it once, when the unit reaches the head of the queue.
pub struct WorkUnit {
    label: String,
    action: Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>,
}

impl WorkUnit {
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move || action().boxed()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkUnit")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Whether a consumption loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Draining,
}

/// What `submit` did with a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The queue was idle; a new consumption loop was started.
    StartedLoop,
    /// A loop was already draining and will pick the unit up.
    Queued,
}

/// Queue configuration.
#[derive(Debug, Clone, Default)]
pub struct QueueConfig {
    /// Abandon a unit that runs longer than this. `None` waits forever.
    pub unit_timeout: Option<Duration>,
}

/// Counters describing the queue's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub loops_started: u64,
    pub completed: u64,
    pub failed: u64,
}

struct QueueState {
    pending: VecDeque<WorkUnit>,
    phase: QueuePhase,
}

struct Shared {
    state: Mutex<QueueState>,
    config: QueueConfig,
    loops_started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    /// `true` while idle.
    idle: watch::Sender<bool>,
}

/// Single-consumer FIFO queue of [`WorkUnit`]s.
///
/// Cloning yields another handle to the same queue. Submitting requires a
/// running tokio runtime, since consumption loops are spawned tasks.
#[derive(Clone)]
pub struct SerialTaskQueue {
    shared: Arc<Shared>,
}

impl Default for SerialTaskQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl SerialTaskQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    phase: QueuePhase::Idle,
                }),
                config,
                loops_started: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                idle,
            }),
        }
    }

    /// Append `unit` to the queue and return immediately.
    pub fn submit(&self, unit: WorkUnit) -> SubmitOutcome {
        let start = {
            let mut state = self.shared.lock();
            state.pending.push_back(unit);
            match state.phase {
                QueuePhase::Draining => false,
                QueuePhase::Idle => {
                    state.phase = QueuePhase::Draining;
                    self.shared.idle.send_replace(false);
                    true
                }
            }
        };

        if !start {
            return SubmitOutcome::Queued;
        }
        self.shared.loops_started.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(drain(self.shared.clone()));
        SubmitOutcome::StartedLoop
    }

    pub fn phase(&self) -> QueuePhase {
        self.shared.lock().phase
    }

    /// Units waiting to run, not counting the one currently running.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            loops_started: self.shared.loops_started.load(Ordering::SeqCst),
            completed: self.shared.completed.load(Ordering::SeqCst),
            failed: self.shared.failed.load(Ordering::SeqCst),
        }
    }

    /// Resolve once the queue is idle.
    pub async fn wait_idle(&self) {
        let mut idle = self.shared.idle.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = idle.wait_for(|idle| *idle).await;
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_unit(&self, unit: WorkUnit) {
        let WorkUnit { label, action } = unit;
        tracing::debug!(unit = %label, "work unit started");

        let guarded = AssertUnwindSafe(async move { action().await }).catch_unwind();
        let outcome = match self.config.unit_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or_else(|_| Ok(Err(anyhow::anyhow!("timed out after {:?}", limit)))),
            None => guarded.await,
        };

        match outcome {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(unit = %label, "work unit finished");
            }
            Ok(Err(err)) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(unit = %label, error = %format!("{err:#}"), "work unit failed");
            }
            Err(panic) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(unit = %label, panic = %panic_message(&*panic), "work unit panicked");
            }
        }
    }
}

async fn drain(shared: Arc<Shared>) {
    loop {
        let unit = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(unit) => unit,
                None => {
                    state.phase = QueuePhase::Idle;
                    shared.idle.send_replace(true);
                    return;
                }
            }
        };
        shared.run_unit(unit).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recording_unit(log: Arc<Mutex<Vec<usize>>>, n: usize) -> WorkUnit {
        WorkUnit::new(format!("unit {n}"), move || async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(n);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_idle_queue_starts_one_loop() {
        let queue = SerialTaskQueue::default();
        let log = Arc::new(Mutex::new(Vec::new()));

        assert_eq!(queue.phase(), QueuePhase::Idle);
        assert_eq!(
            queue.submit(recording_unit(log.clone(), 0)),
            SubmitOutcome::StartedLoop
        );
        assert_eq!(queue.submit(recording_unit(log.clone(), 1)), SubmitOutcome::Queued);
        assert_eq!(queue.phase(), QueuePhase::Draining);

        queue.wait_idle().await;
        assert_eq!(queue.stats().loops_started, 1);
        assert_eq!(queue.phase(), QueuePhase::Idle);

        // A new idle period needs a fresh loop.
        assert_eq!(
            queue.submit(recording_unit(log.clone(), 2)),
            SubmitOutcome::StartedLoop
        );
        queue.wait_idle().await;
        assert_eq!(queue.stats().loops_started, 2);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    fn explode() -> anyhow::Result<()> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let queue = SerialTaskQueue::default();
        let ran = Arc::new(AtomicUsize::new(0));

        queue.submit(WorkUnit::new("fails", || async { Err(anyhow::anyhow!("boom")) }));
        queue.submit(WorkUnit::new("panics", || async { explode() }));
        let counter = ran.clone();
        queue.submit(WorkUnit::new("succeeds", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        queue.wait_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(
            queue.stats(),
            QueueStats {
                loops_started: 1,
                completed: 1,
                failed: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_abandons_hung_unit() {
        let queue = SerialTaskQueue::new(QueueConfig {
            unit_timeout: Some(Duration::from_millis(20)),
        });
        queue.submit(WorkUnit::new("hangs", || async {
            futures::future::pending::<()>().await;
            Ok(())
        }));
        queue.submit(WorkUnit::new("quick", || async { Ok(()) }));

        queue.wait_idle().await;
        assert_eq!(queue.stats().failed, 1);
        assert_eq!(queue.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_wait_idle_on_idle_queue_returns() {
        let queue = SerialTaskQueue::default();
        queue.wait_idle().await;
        assert_eq!(queue.pending(), 0);
    }
}
