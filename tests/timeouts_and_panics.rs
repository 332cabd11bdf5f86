// tests/timeouts_and_panics.rs

mod common;
use crate::common::fake_actions::{RunLog, panicking, sleeping};
use crate::common::{fast_config, finished, init_tracing, with_timeout};

use std::error::Error;
use std::time::Duration;

use serde_json::json;
use workdag::task::{ActionError, TaskStatus, blocking_fn};
use workdag::{Coordinator, TaskSpec};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn panicking_action_fails_the_task_not_the_worker() -> TestResult {
    init_tracing();
    let log = RunLog::new();
    let coordinator = Coordinator::new(fast_config(1));
    coordinator.start();

    let bad = coordinator.submit(TaskSpec::new("bad", panicking("kaboom")).max_retries(1))?;
    let snapshot = with_timeout(finished(&coordinator, bad)).await;
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(snapshot.attempts, 2);
    assert!(snapshot.error.unwrap_or_default().contains("kaboom"));

    // The single worker is still alive.
    let good = coordinator.submit(TaskSpec::new("good", log.recording("good")))?;
    assert_eq!(
        with_timeout(finished(&coordinator, good)).await.status,
        TaskStatus::Completed
    );

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn advisory_timeout_does_not_abort() -> TestResult {
    init_tracing();
    let coordinator = Coordinator::new(fast_config(1));
    coordinator.start();

    let id = coordinator.submit(
        TaskSpec::new("slow", sleeping(Duration::from_millis(60)))
            .timeout(Duration::from_millis(5)),
    )?;
    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.result, Some(json!("slept")));

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn enforced_timeout_counts_as_a_failed_attempt() -> TestResult {
    init_tracing();
    let mut config = fast_config(1);
    config.enforce_timeouts = true;
    let coordinator = Coordinator::new(config);
    coordinator.start();

    let id = coordinator.submit(
        TaskSpec::new("slow", sleeping(Duration::from_secs(30)))
            .timeout(Duration::from_millis(20))
            .max_retries(1),
    )?;
    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(snapshot.attempts, 2);
    assert_eq!(snapshot.error.as_deref(), Some("timed out after 0.02s"));

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn blocking_actions_run_off_the_async_workers() -> TestResult {
    init_tracing();
    let coordinator = Coordinator::new(fast_config(2));
    coordinator.start();

    let id = coordinator.submit(TaskSpec::new(
        "sum",
        blocking_fn(|| {
            std::thread::sleep(Duration::from_millis(10));
            Ok::<_, ActionError>(json!((1..=10).sum::<u32>()))
        }),
    ))?;
    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.result, Some(json!(55)));

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn not_before_delays_the_first_attempt() -> TestResult {
    init_tracing();
    let coordinator = Coordinator::new(fast_config(1));
    coordinator.start();

    let at = chrono::Utc::now() + chrono::Duration::milliseconds(150);
    let log = RunLog::new();
    let id =
        coordinator.submit(TaskSpec::new("scheduled", log.recording("scheduled")).not_before(at))?;

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(log.entries().is_empty());
    assert_eq!(coordinator.status().deferred, 1);

    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert!(snapshot.started_at.unwrap() >= at);

    coordinator.stop().await;
    Ok(())
}
