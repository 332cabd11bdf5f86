// src/task/record.rs

//! The per-task record owned by the coordinator's task table.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::WorkerId;
use crate::errors::{Result, WorkdagError};
use crate::task::action::{Action, TaskOutput};
use crate::task::spec::TaskSpec;
use crate::task::status::{StatusChange, TaskPriority, TaskStatus};

/// Engine-assigned task identifier. Monotonic, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// What happened after a failed attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The task is Pending again; `retry_count` is the retry about to run.
    Retry { retry_count: u32 },
    /// Retry budget exhausted; the task is terminally Failed.
    Exhausted,
}

/// One unit of schedulable work plus its lifecycle state.
///
/// Identity fields are fixed at creation. Lifecycle fields are only mutated by
/// the coordinator while it holds the task-table lock.
#[derive(Clone)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub priority: TaskPriority,
    pub dependencies: BTreeSet<TaskId>,
    pub max_retries: u32,
    /// Recorded for observability; only enforced when the engine is
    /// configured with `enforce_timeouts`.
    pub timeout: Duration,
    pub not_before: Option<DateTime<Utc>>,
    action: Arc<dyn Action>,

    pub status: TaskStatus,
    pub retry_count: u32,
    /// Number of attempts that have been started.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskOutput>,
    pub error: Option<String>,
    pub assigned_worker: Option<WorkerId>,
    pub history: Vec<StatusChange>,
    history_limit: usize,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec, history_limit: usize) -> Self {
        Self {
            id,
            name: spec.name,
            priority: spec.priority,
            dependencies: spec.dependencies,
            max_retries: spec.max_retries,
            timeout: spec.timeout,
            not_before: spec.not_before,
            action: spec.action,
            status: TaskStatus::Pending,
            retry_count: 0,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            assigned_worker: None,
            history: Vec::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub(crate) fn action(&self) -> Arc<dyn Action> {
        Arc::clone(&self.action)
    }

    /// Move to `to`, recording the change in `history`.
    pub fn transition_to(&mut self, to: TaskStatus, reason: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(WorkdagError::InvalidTransition {
                task: self.id.to_string(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        self.history.push(StatusChange {
            from: self.status,
            to,
            at: Utc::now(),
            reason,
        });
        if self.history.len() > self.history_limit {
            let excess = self.history.len() - self.history_limit;
            self.history.drain(..excess);
        }

        self.status = to;
        Ok(())
    }

    /// Pending -> Running for the given worker.
    pub fn mark_running(&mut self, worker: WorkerId) -> Result<()> {
        self.transition_to(TaskStatus::Running, Some(format!("claimed by {worker}")))?;
        self.attempts += 1;
        self.assigned_worker = Some(worker);
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Running -> Completed with the action's output.
    pub fn mark_completed(&mut self, output: TaskOutput) -> Result<()> {
        self.transition_to(TaskStatus::Completed, None)?;
        self.result = Some(output);
        self.error = None;
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Running -> Failed, then straight on to Retrying -> Pending if the
    /// retry budget allows another attempt.
    pub fn record_failure(&mut self, error: String) -> Result<FailureDisposition> {
        self.transition_to(TaskStatus::Failed, Some(error.clone()))?;
        self.result = None;
        self.error = Some(error);

        if self.retry_count >= self.max_retries {
            return Ok(FailureDisposition::Exhausted);
        }

        self.retry_count += 1;
        let reason = format!("retry {}/{}", self.retry_count, self.max_retries);
        self.transition_to(TaskStatus::Retrying, Some(reason))?;
        self.transition_to(TaskStatus::Pending, None)?;

        Ok(FailureDisposition::Retry {
            retry_count: self.retry_count,
        })
    }

    /// Pending -> Cancelled. Returns `false` in any other state.
    pub fn cancel(&mut self) -> bool {
        self.transition_to(TaskStatus::Cancelled, Some("cancelled".to_string()))
            .is_ok()
    }

    /// Time between first start and completion, if both happened.
    pub fn execution_time(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        (completed - started).to_std().ok()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("dependencies", &self.dependencies)
            .field("retry_count", &self.retry_count)
            .field("max_retries", &self.max_retries)
            .field("assigned_worker", &self.assigned_worker)
            .finish_non_exhaustive()
    }
}
