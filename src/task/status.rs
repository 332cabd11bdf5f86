// src/task/status.rs

//! Task priority and lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scheduling priority. Lower ordinal is scheduled first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
    Background = 5,
}

impl TaskPriority {
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Background => "background",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(TaskPriority::Critical),
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            "background" => Ok(TaskPriority::Background),
            other => Err(format!(
                "invalid priority: {other} (expected critical, high, medium, low or background)"
            )),
        }
    }
}

/// Lifecycle status of a task.
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Failed -> Retrying -> Pending   (retries left)
/// Pending -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies or for a worker.
    Pending,
    /// Claimed by a worker; the action is executing.
    Running,
    /// The action returned successfully.
    Completed,
    /// The last attempt failed. Terminal once the retry budget is spent.
    Failed,
    /// Cancelled before any worker claimed it.
    Cancelled,
    /// Transient state between a failed attempt and re-queueing.
    Retrying,
}

impl TaskStatus {
    /// Check if this status allows transitioning to `target`.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Failed, Retrying)
                | (Retrying, Pending)
        )
    }

    /// Terminal from the point of view of an observer.
    ///
    /// `Failed` is only ever observable once retries are exhausted, because the
    /// coordinator moves a retryable failure on to `Pending` under the same lock.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Retrying => "retrying",
        };
        write!(f, "{s}")
    }
}

/// One recorded status transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}
