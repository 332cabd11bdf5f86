// tests/coordinator_lifecycle.rs

mod common;
use crate::common::fake_actions::{Gate, RunLog};
use crate::common::{fast_config, finished, init_tracing, with_timeout};

use std::error::Error;
use std::time::Duration;

use serde_json::json;
use workdag::engine::SystemStatus;
use workdag::task::{ActionError, TaskStatus, action_fn};
use workdag::{Coordinator, TaskSpec};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn submitted_task_returns_its_result() -> TestResult {
    init_tracing();
    let coordinator = Coordinator::new(fast_config(2));
    coordinator.start();

    let id = coordinator.submit(TaskSpec::new(
        "add",
        action_fn(|| async { Ok::<_, ActionError>(json!(2 + 3)) }),
    ))?;

    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.result, Some(json!(5)));
    assert_eq!(snapshot.attempts, 1);
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.completed_at.is_some());
    assert!(snapshot.execution_time.is_some());

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn dependent_runs_after_its_dependency() -> TestResult {
    init_tracing();
    let log = RunLog::new();
    let coordinator = Coordinator::new(fast_config(4));

    let a = coordinator.submit(TaskSpec::new("A", log.recording("A")))?;
    let b = coordinator.submit(TaskSpec::new("B", log.recording("B")).after(a))?;

    let before = coordinator.task(b).unwrap();
    assert_eq!(before.status, TaskStatus::Pending);
    assert_eq!(before.waiting_on, vec![a]);

    coordinator.start();
    let snapshot = with_timeout(finished(&coordinator, b)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(log.entries(), vec!["A", "B"]);

    let a_done = coordinator.task(a).unwrap();
    assert!(a_done.completed_at.unwrap() <= snapshot.started_at.unwrap());

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn status_reports_counts_and_workers() -> TestResult {
    init_tracing();
    let log = RunLog::new();
    let coordinator = Coordinator::new(fast_config(3));

    let status = coordinator.status();
    assert_eq!(status.system_status, SystemStatus::Stopped);
    assert_eq!(status.total_workers, 3);
    assert_eq!(status.workers.len(), 3);

    let ids = (0..5)
        .map(|i| coordinator.submit(TaskSpec::new(format!("t{i}"), log.recording("t"))))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(coordinator.status().counts.pending, 5);
    assert_eq!(coordinator.status().queue_depth, 5);

    coordinator.start();
    assert_eq!(coordinator.status().system_status, SystemStatus::Running);
    assert!(with_timeout(coordinator.wait_until_idle(Duration::from_secs(5))).await);

    let status = coordinator.status();
    assert_eq!(status.counts.total, 5);
    assert_eq!(status.counts.completed, 5);
    assert_eq!(status.queue_depth, 0);
    assert_eq!(status.completed_ids, ids);
    let done: u64 = status.workers.iter().map(|w| w.tasks_completed).sum();
    assert_eq!(done, 5);

    coordinator.stop().await;
    assert_eq!(coordinator.status().system_status, SystemStatus::Stopped);
    Ok(())
}

#[tokio::test]
async fn start_twice_is_a_noop_and_stop_is_idempotent() -> TestResult {
    init_tracing();
    let coordinator = Coordinator::new(fast_config(2));
    coordinator.start();
    coordinator.start();
    assert!(coordinator.is_running());

    coordinator.stop().await;
    coordinator.stop().await;
    assert!(!coordinator.is_running());
    Ok(())
}

#[tokio::test]
async fn queued_work_survives_stop_and_runs_after_restart() -> TestResult {
    init_tracing();
    let log = RunLog::new();
    let coordinator = Coordinator::new(fast_config(1));

    coordinator.start();
    coordinator.stop().await;

    let id = coordinator.submit(TaskSpec::new("later", log.recording("later")))?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(coordinator.task(id).unwrap().status, TaskStatus::Pending);

    coordinator.start();
    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn stop_waits_for_in_flight_action() -> TestResult {
    init_tracing();
    let gate = Gate::new();
    let coordinator = Coordinator::new(fast_config(1));
    let id = coordinator.submit(TaskSpec::new("gated", gate.action()))?;
    coordinator.start();

    with_timeout(gate.entered()).await;
    let running = coordinator.task(id).unwrap();
    assert_eq!(running.status, TaskStatus::Running);
    assert!(running.assigned_worker.is_some());
    assert_eq!(coordinator.status().workers[0].current_task, Some(id));

    let stopper = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.open();
    with_timeout(stopper).await?;

    assert_eq!(coordinator.task(id).unwrap().status, TaskStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn stop_abandons_actions_past_the_grace_period() -> TestResult {
    init_tracing();
    let gate = Gate::new();
    let mut config = fast_config(1);
    config.shutdown_grace = Duration::from_millis(50);
    let coordinator = Coordinator::new(config);

    let id = coordinator.submit(TaskSpec::new("stuck", gate.action()).max_retries(0))?;
    coordinator.start();
    with_timeout(gate.entered()).await;

    with_timeout(coordinator.stop()).await;

    let snapshot = coordinator.task(id).unwrap();
    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert_eq!(snapshot.error.as_deref(), Some("abandoned at shutdown"));
    assert_eq!(coordinator.status().workers[0].tasks_failed, 1);
    Ok(())
}

#[tokio::test]
async fn abandoned_task_with_retries_left_is_requeued() -> TestResult {
    init_tracing();
    let gate = Gate::new();
    let mut config = fast_config(1);
    config.shutdown_grace = Duration::from_millis(50);
    let coordinator = Coordinator::new(config);

    let id = coordinator.submit(TaskSpec::new("stuck", gate.action()).max_retries(1))?;
    coordinator.start();
    with_timeout(gate.entered()).await;
    with_timeout(coordinator.stop()).await;

    let snapshot = coordinator.task(id).unwrap();
    assert_eq!(snapshot.status, TaskStatus::Pending);
    assert_eq!(snapshot.retry_count, 1);

    coordinator.start();
    with_timeout(gate.entered()).await;
    gate.open();
    let snapshot = with_timeout(finished(&coordinator, id)).await;
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.attempts, 2);

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn start_is_refused_until_stop_finishes() -> TestResult {
    init_tracing();
    let gate = Gate::new();
    let log = RunLog::new();
    let mut config = fast_config(1);
    config.shutdown_grace = Duration::from_millis(200);
    let coordinator = Coordinator::new(config);

    let stuck = coordinator.submit(TaskSpec::new("stuck", gate.action()).max_retries(0))?;
    coordinator.start();
    with_timeout(gate.entered()).await;

    let stopper = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.stop().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(coordinator.is_stopping());
    assert!(!coordinator.is_running());
    assert!(!coordinator.start());

    let fresh = coordinator.submit(TaskSpec::new("fresh", log.recording("fresh")))?;
    with_timeout(stopper).await?;
    assert!(!coordinator.is_stopping());

    // Only the task the aborted worker was running is failed.
    let stuck_snapshot = coordinator.task(stuck).unwrap();
    assert_eq!(stuck_snapshot.status, TaskStatus::Failed);
    assert_eq!(stuck_snapshot.error.as_deref(), Some("abandoned at shutdown"));
    let fresh_snapshot = coordinator.task(fresh).unwrap();
    assert_eq!(fresh_snapshot.status, TaskStatus::Pending);
    assert_eq!(fresh_snapshot.attempts, 0);

    assert!(coordinator.start());
    let done = with_timeout(finished(&coordinator, fresh)).await;
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(log.entries(), vec!["fresh"]);

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn history_records_each_transition() -> TestResult {
    init_tracing();
    let log = RunLog::new();
    let coordinator = Coordinator::new(fast_config(1));
    let id = coordinator.submit(TaskSpec::new("h", log.recording("h")))?;
    coordinator.start();

    let snapshot = with_timeout(finished(&coordinator, id)).await;
    let path: Vec<(TaskStatus, TaskStatus)> =
        snapshot.history.iter().map(|c| (c.from, c.to)).collect();
    assert_eq!(
        path,
        vec![
            (TaskStatus::Pending, TaskStatus::Running),
            (TaskStatus::Running, TaskStatus::Completed),
        ]
    );

    coordinator.stop().await;
    Ok(())
}

#[tokio::test]
async fn wait_for_unknown_task_returns_none() -> TestResult {
    let coordinator = Coordinator::new(fast_config(1));
    let missing = workdag::TaskId(77);
    assert!(coordinator.wait_for(missing, Duration::from_millis(20)).await.is_none());
    assert!(coordinator.task(missing).is_none());
    assert!(!coordinator.cancel(missing));
    Ok(())
}
