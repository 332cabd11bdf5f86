// src/engine/coordinator.rs

//! The coordinator: single owner of all scheduling state.
//!
//! It registers tasks, decides readiness through the [`DependencyIndex`],
//! feeds the [`ReadyQueue`], starts and stops the worker pool, applies the
//! retry policy when an attempt fails and answers status queries.
//!
//! Locking: the task table, the dependency index and the ready queue each
//! have their own mutex. When more than one is needed they are always taken
//! in the order tasks -> deps -> queue, and no lock is ever held across an
//! `.await` or while an action runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::{DependencyIndex, check_dependencies};
use crate::engine::queue::ReadyQueue;
use crate::engine::snapshot::{StatusSnapshot, SystemStatus, TaskCounts, TaskSnapshot};
use crate::engine::{EngineConfig, WorkerId, lock};
use crate::errors::{Result, WorkdagError};
use crate::exec::worker::{WorkerSlot, worker_loop};
use crate::task::{
    Action, ActionError, FailureDisposition, Task, TaskId, TaskOutput, TaskSpec, TaskStatus,
};

/// A task handed to a worker by [`Coordinator::claim_next`].
pub(crate) struct Claim {
    pub id: TaskId,
    pub name: String,
    pub action: Arc<dyn Action>,
    pub timeout: Duration,
    pub attempt: u32,
}

/// Handles of a running worker pool.
struct Pool {
    shutdown: watch::Sender<bool>,
    handles: Vec<(WorkerId, JoinHandle<()>)>,
}

/// Lifecycle of the worker pool. `start` is refused while `Stopping`, so
/// worker slots are never shared by two pools.
enum PoolState {
    Stopped,
    Running(Pool),
    Stopping,
}

/// Resets the pool to `Stopped` when `stop` returns or its future is dropped.
struct StoppingGuard<'a>(&'a Mutex<PoolState>);

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = PoolState::Stopped;
    }
}

struct Shared {
    config: EngineConfig,
    next_id: AtomicU64,
    tasks: Mutex<HashMap<TaskId, Task>>,
    deps: Mutex<DependencyIndex>,
    queue: ReadyQueue,
    workers: Vec<Arc<WorkerSlot>>,
    pool: Mutex<PoolState>,
}

/// Cheaply clonable handle to the engine.
///
/// All clones share the same state. Call [`stop`](Self::stop) before
/// dropping the last handle if the pool was started; running workers keep
/// the engine alive until they are told to shut down.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.shared.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> Self {
        let workers = (1..=config.workers.max(1))
            .map(|n| Arc::new(WorkerSlot::new(WorkerId(n))))
            .collect();

        Self {
            shared: Arc::new(Shared {
                config,
                next_id: AtomicU64::new(1),
                tasks: Mutex::new(HashMap::new()),
                deps: Mutex::new(DependencyIndex::new()),
                queue: ReadyQueue::new(),
                workers,
                pool: Mutex::new(PoolState::Stopped),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub(crate) fn queue(&self) -> &ReadyQueue {
        &self.shared.queue
    }

    /// Whether the worker pool is started and not shutting down.
    pub fn is_running(&self) -> bool {
        matches!(*lock(&self.shared.pool), PoolState::Running(_))
    }

    /// Whether a `stop` call is still waiting for workers to exit.
    pub fn is_stopping(&self) -> bool {
        matches!(*lock(&self.shared.pool), PoolState::Stopping)
    }

    /// Register a task and return its ID immediately.
    ///
    /// A task with no unmet dependencies goes straight into the ready queue;
    /// otherwise it stays Pending until its dependencies complete. Errors are
    /// only returned when [`EngineConfig::dependency_check`] rejects the
    /// dependency set; action failures are never reported here.
    pub fn submit(&self, spec: TaskSpec) -> Result<TaskId> {
        let mut tasks = lock(&self.shared.tasks);
        let id = TaskId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));

        check_dependencies(
            self.shared.config.dependency_check,
            id,
            &spec.dependencies,
            tasks.values().map(|t| (t.id, &t.dependencies)),
        )?;

        let task = Task::new(id, spec, self.shared.config.history_limit);
        let ready = lock(&self.shared.deps).register(id, &task.dependencies);

        if ready {
            info!(
                task = %id,
                name = %task.name,
                priority = %task.priority,
                "task added"
            );
            self.enqueue(&task);
        } else {
            info!(
                task = %id,
                name = %task.name,
                priority = %task.priority,
                "task scheduled; waiting for dependencies"
            );
        }

        tasks.insert(id, task);
        Ok(id)
    }

    /// Cancel a task that no worker has claimed yet.
    ///
    /// Returns `false` if the task is unknown or no longer Pending. Any ready
    /// or deferred queue entry for the task is dropped.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut tasks = lock(&self.shared.tasks);
        let Some(task) = tasks.get_mut(&id) else {
            debug!(task = %id, "cancel requested for unknown task");
            return false;
        };

        if !task.cancel() {
            debug!(task = %id, status = %task.status, "cancel ignored; task is not pending");
            return false;
        }

        lock(&self.shared.deps).forget(id);
        self.shared.queue.remove(id);
        info!(task = %id, name = %task.name, "task cancelled");
        true
    }

    /// Detail view of one task.
    pub fn task(&self, id: TaskId) -> Option<TaskSnapshot> {
        let tasks = lock(&self.shared.tasks);
        let task = tasks.get(&id)?;
        let waiting_on = lock(&self.shared.deps)
            .unmet_dependencies(id)
            .unwrap_or_default();
        Some(TaskSnapshot::from_task(task, waiting_on))
    }

    /// Snapshots of every known task, ordered by ID.
    pub fn tasks(&self) -> Vec<TaskSnapshot> {
        let tasks = lock(&self.shared.tasks);
        let deps = lock(&self.shared.deps);
        let mut all: Vec<TaskSnapshot> = tasks
            .values()
            .map(|t| {
                let waiting_on = deps.unmet_dependencies(t.id).unwrap_or_default();
                TaskSnapshot::from_task(t, waiting_on)
            })
            .collect();
        all.sort_by_key(|t| t.id);
        all
    }

    /// Aggregate view: counts by status, queue depth and per-worker stats.
    pub fn status(&self) -> StatusSnapshot {
        let (
            counts,
            average_execution_secs,
            completed_ids,
            failed_ids,
            waiting,
            queue_depth,
            deferred,
        ) = {
            let tasks = lock(&self.shared.tasks);
            let mut counts = TaskCounts::default();
            let mut total_exec = Duration::ZERO;
            let mut timed = 0u32;

            for task in tasks.values() {
                counts.record(task.status);
                if task.status == TaskStatus::Completed {
                    if let Some(d) = task.execution_time() {
                        total_exec += d;
                        timed += 1;
                    }
                }
            }

            let deps = lock(&self.shared.deps);
            let average = if timed > 0 {
                (total_exec / timed).as_secs_f64()
            } else {
                0.0
            };

            (
                counts,
                average,
                deps.completed().iter().copied().collect(),
                deps.failed().iter().copied().collect(),
                deps.waiting_count(),
                self.shared.queue.len(),
                self.shared.queue.deferred_len(),
            )
        };

        StatusSnapshot {
            system_status: if self.is_running() {
                SystemStatus::Running
            } else {
                SystemStatus::Stopped
            },
            total_workers: self.shared.workers.len(),
            counts,
            queue_depth,
            deferred,
            waiting_on_dependencies: waiting,
            completed_ids,
            failed_ids,
            average_execution_secs,
            workers: self.shared.workers.iter().map(|w| w.snapshot()).collect(),
        }
    }

    /// `true` when nothing is running and nothing is queued.
    ///
    /// Tasks blocked on dependencies that can never complete do not prevent
    /// the engine from settling.
    pub fn is_settled(&self) -> bool {
        let tasks = lock(&self.shared.tasks);
        let running = tasks.values().any(|t| t.status == TaskStatus::Running);
        !running && self.shared.queue.total_len() == 0
    }

    /// Poll until the engine is settled. Returns `false` on timeout.
    pub async fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_settled() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.shared.config.idle_poll).await;
        }
    }

    /// Poll until the task reaches a terminal state.
    ///
    /// Returns `None` if the task is unknown or the timeout elapses first.
    pub async fn wait_for(&self, id: TaskId, timeout: Duration) -> Option<TaskSnapshot> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.task(id)?;
            if snapshot.is_terminal() {
                return Some(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.shared.config.idle_poll).await;
        }
    }

    /// Spawn the worker pool.
    ///
    /// Returns `false` without spawning anything if the pool is already
    /// running or a `stop` is still in progress. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) -> bool {
        let mut pool = lock(&self.shared.pool);
        match *pool {
            PoolState::Running(_) => {
                warn!("start called while workers are already running; ignoring");
                return false;
            }
            PoolState::Stopping => {
                warn!("start called while the pool is stopping; ignoring");
                return false;
            }
            PoolState::Stopped => {}
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = self
            .shared
            .workers
            .iter()
            .map(|slot| {
                let handle = tokio::spawn(worker_loop(
                    self.clone(),
                    Arc::clone(slot),
                    shutdown_rx.clone(),
                ));
                (slot.id(), handle)
            })
            .collect();

        *pool = PoolState::Running(Pool { shutdown, handles });
        info!(workers = self.shared.workers.len(), "task coordinator started");
        true
    }

    /// Stop the worker pool.
    ///
    /// Workers finish the attempt they are running and then exit. Workers
    /// still busy after [`EngineConfig::shutdown_grace`] are aborted; the task
    /// each was running is recorded as an abandoned attempt and goes through
    /// the normal retry policy. Queued tasks stay queued for a later `start`.
    ///
    /// `start` is refused until this returns.
    pub async fn stop(&self) {
        let pool = {
            let mut state = lock(&self.shared.pool);
            match std::mem::replace(&mut *state, PoolState::Stopping) {
                PoolState::Running(pool) => pool,
                other => {
                    *state = other;
                    debug!("stop called while not running");
                    return;
                }
            }
        };
        let _stopping = StoppingGuard(&self.shared.pool);

        let _ = pool.shutdown.send(true);
        let deadline = tokio::time::Instant::now() + self.shared.config.shutdown_grace;
        let mut abandoned = Vec::new();

        for (worker, mut handle) in pool.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(worker = %worker, error = %e, "worker terminated abnormally");
                    abandoned.push(worker);
                }
                Err(_) => {
                    warn!(worker = %worker, "worker still busy after shutdown grace; aborting");
                    handle.abort();
                    let _ = handle.await;
                    abandoned.push(worker);
                }
            }
        }

        if !abandoned.is_empty() {
            self.recover_abandoned(&abandoned);
        }

        info!("task coordinator stopped");
    }

    /// Pop ready entries until one can be claimed by `worker`.
    ///
    /// The claim (Pending -> Running) happens under the task-table lock, so a
    /// task is never handed to two workers and a cancelled task is never
    /// handed out at all.
    pub(crate) fn claim_next(&self, worker: WorkerId) -> Option<Claim> {
        let mut tasks = lock(&self.shared.tasks);

        while let Some(id) = self.shared.queue.try_pop() {
            let Some(task) = tasks.get_mut(&id) else {
                error!(task = %id, "queued task missing from task table; dropping entry");
                continue;
            };

            if task.status != TaskStatus::Pending {
                debug!(task = %id, status = %task.status, "skipping stale queue entry");
                continue;
            }

            if let Err(e) = task.mark_running(worker) {
                error!(task = %id, error = %e, "failed to claim task");
                continue;
            }

            return Some(Claim {
                id,
                name: task.name.clone(),
                action: task.action(),
                timeout: task.timeout,
                attempt: task.attempts,
            });
        }

        None
    }

    /// Record the outcome of an attempt made by `worker`.
    pub(crate) fn report(
        &self,
        id: TaskId,
        worker: WorkerId,
        outcome: std::result::Result<TaskOutput, ActionError>,
        elapsed: Duration,
    ) -> Result<()> {
        let mut tasks = lock(&self.shared.tasks);
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| WorkdagError::TaskNotFound(id.to_string()))?;

        if task.status != TaskStatus::Running || task.assigned_worker != Some(worker) {
            warn!(
                task = %id,
                worker = %worker,
                status = %task.status,
                "ignoring outcome for task not running on this worker"
            );
            return Ok(());
        }

        let name = task.name.clone();
        let priority = task.priority;
        let elapsed_ms = elapsed.as_millis() as u64;

        match outcome {
            Ok(output) => {
                task.mark_completed(output)?;
                info!(task = %id, name = %name, worker = %worker, elapsed_ms, "task completed");

                let promoted = lock(&self.shared.deps).on_task_completed(id);
                for dependent in promoted {
                    match tasks.get(&dependent) {
                        Some(t) if t.status == TaskStatus::Pending => {
                            info!(task = %dependent, name = %t.name, "task unblocked");
                            self.enqueue(t);
                        }
                        Some(t) => {
                            debug!(
                                task = %dependent,
                                status = %t.status,
                                "dependent no longer pending"
                            );
                        }
                        None => {
                            warn!(task = %dependent, "dependent missing from task table");
                        }
                    }
                }
            }
            Err(err) => match task.record_failure(err.to_string())? {
                FailureDisposition::Retry { retry_count } => {
                    let delay = self.shared.config.backoff.delay_for(retry_count);
                    warn!(
                        task = %id,
                        name = %name,
                        worker = %worker,
                        error = %err,
                        retry = retry_count,
                        max_retries = task.max_retries,
                        ?delay,
                        "task attempt failed; retrying"
                    );
                    self.shared.queue.push_after(id, priority, delay);
                }
                FailureDisposition::Exhausted => {
                    error!(
                        task = %id,
                        name = %name,
                        worker = %worker,
                        error = %err,
                        attempts = task.attempts,
                        "task failed; retries exhausted"
                    );
                    lock(&self.shared.deps).on_task_failed(id);
                }
            },
        }

        Ok(())
    }

    /// Put a ready task in the queue, honouring its `not_before` time.
    fn enqueue(&self, task: &Task) {
        let delay = task
            .not_before
            .and_then(|at| (at - Utc::now()).to_std().ok())
            .unwrap_or(Duration::ZERO);
        self.shared.queue.push_after(task.id, task.priority, delay);
    }

    /// Fail the attempt each aborted worker was in the middle of.
    ///
    /// Only the task recorded in the worker's own slot is touched; `report`
    /// ignores it unless it is still Running on that worker.
    fn recover_abandoned(&self, workers: &[WorkerId]) {
        for slot in self.shared.workers.iter().filter(|s| workers.contains(&s.id())) {
            let worker = slot.id();
            let Some(id) = slot.abandon() else {
                continue;
            };
            warn!(task = %id, worker = %worker, "recovering task abandoned at shutdown");
            if let Err(e) = self.report(id, worker, Err(ActionError::Abandoned), Duration::ZERO) {
                error!(task = %id, error = %e, "failed to recover abandoned task");
            }
        }
    }
}
