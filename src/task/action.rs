// src/task/action.rs

//! Opaque units of work.
//!
//! The engine never looks inside an action: it calls it, awaits the result and
//! records either the output or the error. Arguments are captured by the
//! closure (or struct) implementing [`Action`].
//!
//! - [`action_fn`] wraps an async closure.
//! - [`blocking_fn`] wraps a synchronous closure and runs it on Tokio's
//!   blocking thread pool so it cannot stall the workers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Value produced by a successful action.
pub type TaskOutput = serde_json::Value;

/// Boxed future returned by [`Action::call`].
pub type ActionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TaskOutput, ActionError>> + Send + 'a>>;

/// Failure of a single attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),

    #[error("action panicked: {0}")]
    Panicked(String),

    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("abandoned at shutdown")]
    Abandoned,
}

impl ActionError {
    pub fn msg(message: impl fmt::Display) -> Self {
        ActionError::Failed(message.to_string())
    }
}

impl From<anyhow::Error> for ActionError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line.
        ActionError::Failed(format!("{err:#}"))
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        ActionError::Failed(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        ActionError::Failed(message.to_string())
    }
}

/// A schedulable unit of work.
///
/// Implementations must be callable more than once: a failed attempt is
/// retried by calling the same action again.
pub trait Action: Send + Sync + 'static {
    fn call(&self) -> ActionFuture<'_>;
}

/// [`Action`] backed by an async closure.
pub struct ActionFn<F> {
    f: F,
}

impl<F, Fut> Action for ActionFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TaskOutput, ActionError>> + Send + 'static,
{
    fn call(&self) -> ActionFuture<'_> {
        Box::pin((self.f)())
    }
}

/// Wrap an async closure as an action.
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn Action>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TaskOutput, ActionError>> + Send + 'static,
{
    Arc::new(ActionFn { f })
}

/// [`Action`] backed by a synchronous closure.
pub struct BlockingActionFn<F> {
    f: Arc<F>,
}

impl<F> Action for BlockingActionFn<F>
where
    F: Fn() -> Result<TaskOutput, ActionError> + Send + Sync + 'static,
{
    fn call(&self) -> ActionFuture<'_> {
        let f = Arc::clone(&self.f);
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f()).await {
                Ok(result) => result,
                Err(join_err) if join_err.is_panic() => Err(ActionError::Panicked(
                    panic_message(join_err.into_panic().as_ref()),
                )),
                Err(join_err) => Err(ActionError::msg(join_err)),
            }
        })
    }
}

/// Wrap a blocking closure as an action.
pub fn blocking_fn<F>(f: F) -> Arc<dyn Action>
where
    F: Fn() -> Result<TaskOutput, ActionError> + Send + Sync + 'static,
{
    Arc::new(BlockingActionFn { f: Arc::new(f) })
}

/// Best-effort extraction of a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
