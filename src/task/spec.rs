// src/task/spec.rs

//! Submission-time description of a task.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::task::action::Action;
use crate::task::record::TaskId;
use crate::task::status::TaskPriority;

/// Retry budget used when a spec does not set one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Advisory timeout used when a spec does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a caller provides when submitting work.
///
/// ```ignore
/// let id = coordinator.submit(
///     TaskSpec::new("render", action)
///         .priority(TaskPriority::High)
///         .after(fetch_id)
///         .max_retries(1),
/// )?;
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    pub name: String,
    pub priority: TaskPriority,
    pub action: Arc<dyn Action>,
    pub dependencies: BTreeSet<TaskId>,
    pub max_retries: u32,
    pub timeout: Duration,
    /// Earliest time at which the task may start.
    pub not_before: Option<DateTime<Utc>>,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, action: Arc<dyn Action>) -> Self {
        Self {
            name: name.into(),
            priority: TaskPriority::default(),
            action,
            dependencies: BTreeSet::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            not_before: None,
        }
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn after(mut self, dependency: TaskId) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    pub fn after_all(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn not_before(mut self, at: DateTime<Utc>) -> Self {
        self.not_before = Some(at);
        self
    }
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("dependencies", &self.dependencies)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("not_before", &self.not_before)
            .finish_non_exhaustive()
    }
}
