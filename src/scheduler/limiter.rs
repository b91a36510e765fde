//! Rate-capped FIFO scheduler.
//!
//! A single drain loop pops tasks in submission order and keeps
//! dispatch-to-dispatch spacing at or above `1s / target_rps`. Tasks run one
//! at a time, so a slow upstream call holds its slot until it resolves.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::task::{QueuedTask, TaskFuture, TaskOutcome};
use crate::error::{ProxyError, Result};

/// Point-in-time view of the scheduler for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub pending: usize,
    pub dispatched: u64,
    pub failed: u64,
    pub draining: bool,
    pub min_interval_ms: u64,
}

#[derive(Debug, Default)]
struct SchedulerState {
    queue: VecDeque<QueuedTask>,
    last_dispatch: Option<Instant>,
    is_draining: bool,
    next_id: u64,
    dispatched: u64,
    failed: u64,
}

/// Ordered, rate-capped gate in front of the upstream API.
///
/// The state lock is never held across an `.await`.
#[derive(Debug)]
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    min_interval: Duration,
}

impl Scheduler {
    /// Creates a scheduler dispatching at most `target_rps` tasks per second.
    ///
    /// Non-positive or non-finite rates disable spacing, and rates too small
    /// for a `Duration` saturate to `Duration::MAX`. `Config::validate` keeps
    /// both out of production.
    pub fn new(target_rps: f64) -> Arc<Self> {
        let min_interval = if target_rps.is_finite() && target_rps > 0.0 {
            Duration::try_from_secs_f64(1.0 / target_rps).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self::with_min_interval(min_interval)
    }

    pub fn with_min_interval(min_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState::default()),
            min_interval,
        })
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    // == Schedule ==
    /// Appends `job` to the queue and waits until it has run.
    ///
    /// Jobs execute in strict submission order. A failing job reports its
    /// error to this caller only; later jobs are unaffected.
    pub async fn schedule<F, Fut, T>(self: &Arc<Self>, job: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let id = self.enqueue(move || -> TaskFuture {
            Box::pin(async move {
                let result = job().await;
                let outcome = match &result {
                    Ok(_) => TaskOutcome::Completed,
                    Err(e) => TaskOutcome::Failed(e.to_string()),
                };
                if tx.send(result).is_err() {
                    debug!("caller went away before its scheduled task finished");
                }
                outcome
            })
        });

        rx.await.map_err(|_| {
            ProxyError::Internal(format!("scheduled task {} ended without a result", id))
        })?
    }

    /// Snapshot of queue depth and counters.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.lock();
        SchedulerSnapshot {
            pending: state.queue.len(),
            dispatched: state.dispatched,
            failed: state.failed,
            draining: state.is_draining,
            min_interval_ms: self.min_interval.as_millis() as u64,
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn enqueue<F>(self: &Arc<Self>, execute: F) -> u64
    where
        F: FnOnce() -> TaskFuture + Send + 'static,
    {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.queue.push_back(QueuedTask::new(id, execute));
        debug!(task_id = id, pending = state.queue.len(), "task queued");

        if !state.is_draining {
            state.is_draining = true;
            tokio::spawn(Arc::clone(self).drain());
        }
        id
    }

    // == Drain ==
    /// Dispatches queued tasks until the queue is empty.
    ///
    /// At most one drain runs at a time: `is_draining` is set by whoever
    /// spawns it and cleared under the same lock that observes the empty
    /// queue, so a concurrent `enqueue` either sees the flag or starts a
    /// fresh drain.
    async fn drain(self: Arc<Self>) {
        loop {
            let (task, wait) = {
                let mut state = self.lock();
                let Some(task) = state.queue.pop_front() else {
                    state.is_draining = false;
                    return;
                };
                let wait = state
                    .last_dispatch
                    .map(|last| self.min_interval.saturating_sub(last.elapsed()))
                    .unwrap_or(Duration::ZERO);
                (task, wait)
            };

            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            {
                let mut state = self.lock();
                state.last_dispatch = Some(Instant::now());
                state.dispatched += 1;
            }

            let id = task.id;
            debug!(task_id = id, "dispatching task");

            // Run on its own task so a panic surfaces as a JoinError here
            // instead of killing the drain loop.
            match tokio::spawn(task.dispatch()).await {
                Ok(TaskOutcome::Completed) => {
                    debug!(task_id = id, "task completed");
                }
                Ok(TaskOutcome::Failed(reason)) => {
                    self.lock().failed += 1;
                    warn!(task_id = id, %reason, "scheduled task failed");
                }
                Err(join_error) => {
                    self.lock().failed += 1;
                    error!(task_id = id, error = %join_error, "scheduled task panicked");
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
