// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::{Backoff, EngineConfig};
use crate::task::TaskPriority;
use crate::types::{BackoffKind, DependencyCheck};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// workers = 2
/// backoff = "exponential"
///
/// [task.fetch]
/// cmd = "curl -sSfO https://example.com/data.csv"
/// max_retries = 5
///
/// [task.build]
/// cmd = "make"
/// priority = "high"
/// after = ["fetch"]
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Holds the same data as [`RawConfigFile`] plus a submission order in which
/// every task comes after all of its `after` dependencies.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub task: BTreeMap<String, TaskConfig>,
    order: Vec<String>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        task: BTreeMap<String, TaskConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            engine,
            task,
            order,
        }
    }

    /// Task names in dependency order.
    pub fn submission_order(&self) -> &[String] {
        &self.order
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    #[serde(default)]
    pub dependency_check: DependencyCheck,

    #[serde(default)]
    pub enforce_timeouts: bool,

    #[serde(default)]
    pub backoff: BackoffKind,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_workers() -> usize {
    4
}

fn default_idle_poll_ms() -> u64 {
    100
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_max_ms() -> u64 {
    10_000
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            idle_poll_ms: default_idle_poll_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            dependency_check: DependencyCheck::default(),
            enforce_timeouts: false,
            backoff: BackoffKind::default(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        let backoff = match self.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Exponential => Backoff::Exponential {
                base: Duration::from_millis(self.backoff_base_ms),
                max: Duration::from_millis(self.backoff_max_ms),
            },
        };

        EngineConfig {
            workers: self.workers,
            idle_poll: Duration::from_millis(self.idle_poll_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            backoff,
            dependency_check: self.dependency_check,
            enforce_timeouts: self.enforce_timeouts,
            ..EngineConfig::default()
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command to run.
    pub cmd: String,

    #[serde(default)]
    pub priority: TaskPriority,

    /// Names of tasks that must complete first.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    crate::task::spec::DEFAULT_MAX_RETRIES
}

fn default_timeout_secs() -> u64 {
    crate::task::spec::DEFAULT_TIMEOUT.as_secs()
}

impl TaskConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
