//! Actions with scripted behaviour for exercising the coordinator.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::Notify;
use workdag::task::{Action, ActionError, ActionFuture, action_fn};

/// Shared log of action names in the order they started.
#[derive(Clone, Default)]
pub struct RunLog(Arc<Mutex<Vec<String>>>);

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action that records `name` and succeeds with it as output.
    pub fn recording(&self, name: &str) -> Arc<dyn Action> {
        let log = self.clone();
        let name = name.to_string();
        action_fn(move || {
            let log = log.clone();
            let name = name.clone();
            async move {
                log.0.lock().unwrap().push(name.clone());
                Ok::<_, ActionError>(json!(name))
            }
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Fails the first `failures` calls, then succeeds with the attempt number.
pub struct Flaky {
    failures: u32,
    calls: AtomicU32,
}

impl Flaky {
    pub fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Action for Flaky {
    fn call(&self) -> ActionFuture<'_> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(ActionError::Failed(format!("scripted failure {n}")))
            } else {
                Ok(json!({ "attempt": n }))
            }
        })
    }
}

/// Fails on every call with `message`.
pub fn always_fail(message: &str) -> Arc<dyn Action> {
    let message = message.to_string();
    action_fn(move || {
        let message = message.clone();
        async move { Err::<serde_json::Value, _>(ActionError::Failed(message)) }
    })
}

/// Panics on every call.
pub fn panicking(message: &'static str) -> Arc<dyn Action> {
    action_fn(move || async move {
        if !message.is_empty() {
            panic!("{message}");
        }
        Ok::<_, ActionError>(json!(null))
    })
}

/// Sleeps for `delay`, then succeeds.
pub fn sleeping(delay: Duration) -> Arc<dyn Action> {
    action_fn(move || async move {
        tokio::time::sleep(delay).await;
        Ok::<_, ActionError>(json!("slept"))
    })
}

/// Blocks until [`Gate::open`] is called. Lets a test hold a worker busy.
#[derive(Clone, Default)]
pub struct Gate {
    notify: Arc<Notify>,
    entered: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(&self) -> Arc<dyn Action> {
        let gate = self.clone();
        action_fn(move || {
            let gate = gate.clone();
            async move {
                gate.entered.notify_one();
                gate.notify.notified().await;
                Ok::<_, ActionError>(json!("opened"))
            }
        })
    }

    /// Wait until the gated action has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.notify.notify_one();
    }
}
