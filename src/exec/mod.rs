// src/exec/mod.rs

//! Execution layer.
//!
//! - [`worker`] owns the worker loop and per-worker statistics.
//! - [`task_runner`] runs one attempt of an action, isolating panics and
//!   optionally enforcing the task timeout.
//! - [`command`] provides [`ShellCommand`], an action that runs a shell
//!   command; the CLI runner builds its tasks from these.

pub mod command;
pub mod task_runner;
pub mod worker;

pub use command::ShellCommand;
pub use task_runner::run_attempt;
pub use worker::WorkerSlot;
