// src/report.rs

//! Final report printed by the CLI runner.

use std::fmt::Write as _;

use serde::Serialize;

use crate::engine::{StatusSnapshot, TaskSnapshot};
use crate::task::TaskStatus;

/// How the wait for the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing left to run.
    Settled,
    /// `--wait-secs` elapsed first.
    TimedOut,
    /// Ctrl-C.
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// One entry per configured task, in submission order.
    pub tasks: Vec<TaskSnapshot>,
    pub status: StatusSnapshot,
}

impl RunReport {
    /// Every task completed and the run settled.
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Settled
            && self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    /// Names of tasks that failed after exhausting their retries.
    pub fn failed(&self) -> Vec<&str> {
        self.names_with(|t| t.status == TaskStatus::Failed)
    }

    /// Names of tasks that never ran to completion or failure.
    pub fn unfinished(&self) -> Vec<&str> {
        self.names_with(|t| !t.is_terminal())
    }

    fn names_with(&self, pred: impl Fn(&TaskSnapshot) -> bool) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| pred(t))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let counts = &self.status.counts;
        let _ = writeln!(
            out,
            "workdag: {} task(s), {} completed, {} failed, {} not run ({:?})",
            counts.total,
            counts.completed,
            counts.failed,
            counts.total - counts.terminal(),
            self.outcome,
        );

        for task in &self.tasks {
            let _ = write!(
                out,
                "  {:<20} {:<10} attempts={}",
                task.name,
                task.status.to_string(),
                task.attempts
            );
            if let Some(secs) = task.execution_time {
                let _ = write!(out, " time={secs:.3}s");
            }
            if let Some(err) = &task.error {
                let _ = write!(out, " error={err:?}");
            }
            if !task.waiting_on.is_empty() {
                let ids: Vec<String> = task.waiting_on.iter().map(ToString::to_string).collect();
                let _ = write!(out, " waiting_on={}", ids.join(","));
            }
            out.push('\n');
        }

        for worker in &self.status.workers {
            let _ = writeln!(
                out,
                "  {}: completed={} failed={} avg={:.3}s",
                worker.id,
                worker.tasks_completed,
                worker.tasks_failed,
                worker.average_execution_secs
            );
        }

        out
    }
}
