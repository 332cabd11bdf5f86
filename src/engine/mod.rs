// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the ready queue (priority order, FIFO among equals)
//! - the coordinator, which owns the task table and the dependency index,
//!   starts/stops the worker pool and applies the retry policy
//! - status snapshots for outside observers
//!
//! Worker loops themselves live in [`crate::exec`].

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::types::DependencyCheck;

pub mod coordinator;
pub mod queue;
pub mod retry;
pub mod snapshot;

pub use coordinator::Coordinator;
pub use queue::ReadyQueue;
pub use retry::Backoff;
pub use snapshot::{StatusSnapshot, SystemStatus, TaskCounts, TaskSnapshot, WorkerSnapshot};

/// Stable identity of a worker in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Engine options.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of the worker pool.
    pub workers: usize,
    /// Upper bound on how long an idle worker waits before polling again.
    pub idle_poll: Duration,
    /// How long `stop()` waits for in-flight actions before abandoning them.
    pub shutdown_grace: Duration,
    /// Delay before a failed task is handed out again.
    pub backoff: Backoff,
    /// Submission-time dependency validation.
    pub dependency_check: DependencyCheck,
    /// Abort attempts that exceed the task's timeout instead of only logging.
    pub enforce_timeouts: bool,
    /// Maximum number of status changes kept per task.
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            idle_poll: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(5),
            backoff: Backoff::None,
            dependency_check: DependencyCheck::Off,
            enforce_timeouts: false,
            history_limit: 200,
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
