// src/engine/snapshot.rs

//! Plain, serialisable views of engine state.
//!
//! The engine itself never serialises these; they derive `Serialize` so that
//! an outer surface (admin endpoint, CLI `--json`) can.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::WorkerId;
use crate::task::{StatusChange, Task, TaskId, TaskOutput, TaskPriority, TaskStatus};

/// Point-in-time copy of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub dependencies: BTreeSet<TaskId>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub attempts: u32,
    pub timeout_secs: f64,
    pub not_before: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Seconds between first start and completion.
    pub execution_time: Option<f64>,
    pub result: Option<TaskOutput>,
    pub error: Option<String>,
    pub assigned_worker: Option<WorkerId>,
    /// Dependencies not completed yet, for tasks still waiting on some.
    pub waiting_on: Vec<TaskId>,
    pub history: Vec<StatusChange>,
}

impl TaskSnapshot {
    pub fn from_task(task: &Task, waiting_on: Vec<TaskId>) -> Self {
        Self {
            id: task.id,
            name: task.name.clone(),
            priority: task.priority,
            status: task.status,
            dependencies: task.dependencies.clone(),
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            attempts: task.attempts,
            timeout_secs: task.timeout.as_secs_f64(),
            not_before: task.not_before,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            execution_time: task.execution_time().map(|d| d.as_secs_f64()),
            result: task.result.clone(),
            error: task.error.clone(),
            assigned_worker: task.assigned_worker,
            waiting_on,
            history: task.history.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Number of tasks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retrying: usize,
}

impl TaskCounts {
    pub fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
            TaskStatus::Retrying => self.retrying += 1,
        }
    }

    /// Tasks that have reached a terminal state.
    pub fn terminal(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }
}

/// Per-worker view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub current_task: Option<TaskId>,
    pub current_task_name: Option<String>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Time spent on successful attempts, in seconds.
    pub total_execution_secs: f64,
    /// `total_execution_secs / tasks_completed`.
    pub average_execution_secs: f64,
}

/// Whether the worker pool is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Running,
    Stopped,
}

/// Aggregate engine status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub system_status: SystemStatus,
    pub total_workers: usize,
    pub counts: TaskCounts,
    /// Tasks that can be popped right now.
    pub queue_depth: usize,
    /// Tasks queued behind a retry backoff or a `not_before` time.
    pub deferred: usize,
    /// Pending tasks still waiting on dependencies.
    pub waiting_on_dependencies: usize,
    pub completed_ids: Vec<TaskId>,
    pub failed_ids: Vec<TaskId>,
    /// Mean execution time over completed tasks, in seconds.
    pub average_execution_secs: f64,
    pub workers: Vec<WorkerSnapshot>,
}
