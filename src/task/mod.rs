// src/task/mod.rs

//! Task definitions.
//!
//! - [`status`] holds the priority and lifecycle enums.
//! - [`action`] defines the opaque [`Action`] the workers execute.
//! - [`spec`] is what callers hand to the coordinator.
//! - [`record`] is the coordinator-owned record of one task.

pub mod action;
pub mod record;
pub mod spec;
pub mod status;

pub use action::{Action, ActionError, ActionFuture, TaskOutput, action_fn, blocking_fn};
pub use record::{FailureDisposition, Task, TaskId};
pub use spec::TaskSpec;
pub use status::{StatusChange, TaskPriority, TaskStatus};
