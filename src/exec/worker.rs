// src/exec/worker.rs

//! Worker loop and per-worker bookkeeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::engine::snapshot::WorkerSnapshot;
use crate::engine::{Coordinator, WorkerId, lock};
use crate::task::TaskId;

use super::task_runner::run_attempt;

#[derive(Debug, Default)]
struct WorkerStats {
    current: Option<(TaskId, String)>,
    tasks_completed: u64,
    tasks_failed: u64,
    /// Time spent on successful attempts only.
    total_execution: Duration,
}

/// A pool slot. Outlives the worker loop so stats survive stop/start.
#[derive(Debug)]
pub struct WorkerSlot {
    id: WorkerId,
    stats: Mutex<WorkerStats>,
}

impl WorkerSlot {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            stats: Mutex::new(WorkerStats::default()),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    fn begin(&self, task: TaskId, name: &str) {
        lock(&self.stats).current = Some((task, name.to_string()));
    }

    fn finish(&self, success: bool, elapsed: Duration) {
        let mut stats = lock(&self.stats);
        stats.current = None;
        if success {
            stats.tasks_completed += 1;
            stats.total_execution += elapsed;
        } else {
            stats.tasks_failed += 1;
        }
    }

    /// The worker was aborted mid-attempt. Returns the task it was running.
    pub(crate) fn abandon(&self) -> Option<TaskId> {
        let mut stats = lock(&self.stats);
        let (task, _) = stats.current.take()?;
        stats.tasks_failed += 1;
        Some(task)
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let stats = lock(&self.stats);
        let total = stats.total_execution.as_secs_f64();
        WorkerSnapshot {
            id: self.id,
            current_task: stats.current.as_ref().map(|(id, _)| *id),
            current_task_name: stats.current.as_ref().map(|(_, name)| name.clone()),
            tasks_completed: stats.tasks_completed,
            tasks_failed: stats.tasks_failed,
            total_execution_secs: total,
            average_execution_secs: if stats.tasks_completed > 0 {
                total / stats.tasks_completed as f64
            } else {
                0.0
            },
        }
    }
}

/// Main loop of one worker.
///
/// Claims the next ready task, runs one attempt and reports the outcome.
/// When there is nothing to do it sleeps until new work is pushed, the idle
/// poll interval elapses or shutdown is signalled. Shutdown is only observed
/// between attempts.
pub(crate) async fn worker_loop(
    coordinator: Coordinator,
    slot: Arc<WorkerSlot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let worker = slot.id();
    let idle_poll = coordinator.config().idle_poll;
    let enforce = coordinator.config().enforce_timeouts;
    info!(worker = %worker, "worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(claim) = coordinator.claim_next(worker) else {
            tokio::select! {
                _ = coordinator.queue().wait_for_work(idle_poll) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!(worker = %worker, "shutdown channel closed");
                        break;
                    }
                }
            }
            continue;
        };

        debug!(
            worker = %worker,
            task = %claim.id,
            name = %claim.name,
            attempt = claim.attempt,
            "running task"
        );
        slot.begin(claim.id, &claim.name);

        let started = Instant::now();
        let outcome = run_attempt(claim.action, claim.timeout, enforce).await;
        let elapsed = started.elapsed();

        if !enforce && elapsed > claim.timeout {
            warn!(
                worker = %worker,
                task = %claim.id,
                name = %claim.name,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = claim.timeout.as_millis() as u64,
                "task exceeded its timeout"
            );
        }

        slot.finish(outcome.is_ok(), elapsed);

        if let Err(e) = coordinator.report(claim.id, worker, outcome, elapsed) {
            error!(worker = %worker, task = %claim.id, error = %e, "failed to record task outcome");
        }
    }

    info!(worker = %worker, "worker stopped");
}
