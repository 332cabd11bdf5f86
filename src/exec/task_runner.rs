// src/exec/task_runner.rs

//! Runs a single attempt of a task's action.
//!
//! The action runs on its own Tokio task; a panic inside it surfaces as a
//! `JoinError` and is reported as [`ActionError::Panicked`].

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::task::action::panic_message;
use crate::task::{Action, ActionError, TaskOutput};

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<Result<TaskOutput, ActionError>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Execute `action` once.
///
/// With `enforce_timeout` set, an attempt running past `timeout` is aborted
/// and reported as [`ActionError::TimedOut`]. Otherwise the timeout is left
/// to the caller to observe.
pub async fn run_attempt(
    action: Arc<dyn Action>,
    timeout: Duration,
    enforce_timeout: bool,
) -> Result<TaskOutput, ActionError> {
    let mut guard = AbortOnDrop(tokio::spawn(async move { action.call().await }));

    let joined = if enforce_timeout {
        match tokio::time::timeout(timeout, &mut guard.0).await {
            Ok(joined) => joined,
            Err(_) => return Err(ActionError::TimedOut(timeout)),
        }
    } else {
        (&mut guard.0).await
    };

    match joined {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => Err(ActionError::Panicked(panic_message(&*e.into_panic()))),
        Err(e) => Err(ActionError::Failed(format!("action task aborted: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::action_fn;
    use serde_json::json;

    #[tokio::test]
    async fn returns_action_output() {
        let action = action_fn(|| async { Ok::<_, ActionError>(json!({"n": 3})) });
        let out = run_attempt(action, Duration::from_secs(1), true).await;
        assert_eq!(out, Ok(json!({"n": 3})));
    }

    #[tokio::test]
    async fn panic_becomes_panicked_error() {
        let action = action_fn(|| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, ActionError>(json!(null))
        });
        let out = run_attempt(action, Duration::from_secs(1), false).await;
        match out {
            Err(ActionError::Panicked(msg)) => assert!(msg.contains("kaboom")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn enforced_timeout_aborts_attempt() {
        let action = action_fn(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, ActionError>(json!(null))
        });
        let out = run_attempt(action, Duration::from_millis(20), true).await;
        assert_eq!(out, Err(ActionError::TimedOut(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn advisory_timeout_lets_attempt_finish() {
        let action = action_fn(|| async {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok::<_, ActionError>(json!("late"))
        });
        let out = run_attempt(action, Duration::from_millis(5), false).await;
        assert_eq!(out, Ok(json!("late")));
    }
}
