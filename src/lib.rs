// src/lib.rs

//! `workdag`: a concurrent task-scheduling engine.
//!
//! The library API is centred on [`Coordinator`]: submit [`TaskSpec`]s with
//! priorities and dependencies, start a pool of workers, and observe progress
//! through snapshots. The `workdag` binary wraps it with a TOML-driven runner
//! for shell commands.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod report;
pub mod task;
pub mod types;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

pub use crate::engine::{Coordinator, EngineConfig};
pub use crate::errors::WorkdagError;
pub use crate::task::{Action, ActionError, TaskId, TaskPriority, TaskSpec, TaskStatus};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::exec::ShellCommand;
use crate::report::{RunOutcome, RunReport};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, submits every task, runs the pool until the graph
/// settles (or the wait bound / Ctrl-C hits), prints a report and fails if
/// any task did not complete.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from '{}'", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let report = execute(&cfg, args.workers, Duration::from_secs(args.wait_secs)).await?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }

    match report.outcome {
        RunOutcome::TimedOut => bail!("run did not settle within {}s", args.wait_secs),
        RunOutcome::Interrupted => bail!("run interrupted"),
        RunOutcome::Settled => {}
    }

    let failed = report.failed();
    if !failed.is_empty() {
        bail!("{} task(s) failed: {}", failed.len(), failed.join(", "));
    }
    let unfinished = report.unfinished();
    if !unfinished.is_empty() {
        bail!("{} task(s) never ran: {}", unfinished.len(), unfinished.join(", "));
    }

    Ok(())
}

/// Run every task in `cfg` to completion and collect the report.
///
/// The coordinator is stopped before returning, whatever the outcome.
pub async fn execute(
    cfg: &ConfigFile,
    workers: Option<usize>,
    wait: Duration,
) -> Result<RunReport> {
    let mut engine_config = cfg.engine.to_engine_config();
    if let Some(n) = workers {
        engine_config = engine_config.with_workers(n.max(1));
    }

    let coordinator = Coordinator::new(engine_config);
    let ids = submit_all(&coordinator, cfg)?;

    coordinator.start();

    let outcome = tokio::select! {
        settled = coordinator.wait_until_idle(wait) => {
            if settled { RunOutcome::Settled } else { RunOutcome::TimedOut }
        }
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => warn!("Ctrl-C received; stopping workers"),
                Err(e) => warn!(error = %e, "failed to listen for Ctrl-C; stopping workers"),
            }
            RunOutcome::Interrupted
        }
    };

    coordinator.stop().await;

    let tasks = cfg
        .submission_order()
        .iter()
        .filter_map(|name| ids.get(name.as_str()).and_then(|id| coordinator.task(*id)))
        .collect();

    Ok(RunReport {
        outcome,
        tasks,
        status: coordinator.status(),
    })
}

/// Submit tasks in dependency order, resolving `after` names to IDs.
fn submit_all<'a>(
    coordinator: &Coordinator,
    cfg: &'a ConfigFile,
) -> Result<HashMap<&'a str, TaskId>> {
    let mut ids: HashMap<&str, TaskId> = HashMap::new();

    for name in cfg.submission_order() {
        let Some(task) = cfg.task.get(name) else {
            bail!("task '{name}' missing from config");
        };

        let deps = task
            .after
            .iter()
            .map(|dep| {
                ids.get(dep.as_str())
                    .copied()
                    .with_context(|| format!("task '{name}' submitted before dependency '{dep}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let command = ShellCommand::new(name.clone(), task.cmd.clone());
        let spec = TaskSpec::new(name.clone(), Arc::new(command))
            .priority(task.priority)
            .after_all(deps)
            .max_retries(task.max_retries)
            .timeout(task.timeout());

        let id = coordinator.submit(spec)?;
        debug!(task = %id, name = %name, "submitted from config");
        ids.insert(name.as_str(), id);
    }

    info!(tasks = ids.len(), "all configured tasks submitted");
    Ok(ids)
}

/// Print the engine settings and tasks in submission order.
fn print_dry_run(cfg: &ConfigFile) {
    let engine = &cfg.engine;
    println!("workdag dry-run");
    println!("  engine.workers = {}", engine.workers);
    println!("  engine.dependency_check = {:?}", engine.dependency_check);
    println!("  engine.backoff = {:?}", engine.backoff);
    println!("  engine.enforce_timeouts = {}", engine.enforce_timeouts);
    println!();

    println!("tasks ({}), in submission order:", cfg.task.len());
    for name in cfg.submission_order() {
        let Some(task) = cfg.task.get(name) else {
            continue;
        };
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        println!("      priority: {}", task.priority);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        println!(
            "      max_retries: {}, timeout: {}s",
            task.max_retries, task.timeout_secs
        );
    }

    debug!("dry-run complete (no execution)");
}
