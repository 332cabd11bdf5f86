use std::collections::BTreeMap;

use workdag::config::{ConfigFile, EngineSection, RawConfigFile, TaskConfig};
use workdag::task::TaskPriority;
use workdag::types::{BackoffKind, DependencyCheck};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                engine: EngineSection {
                    idle_poll_ms: 10,
                    shutdown_grace_ms: 500,
                    ..EngineSection::default()
                },
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.engine.workers = workers;
        self
    }

    pub fn dependency_check(mut self, mode: DependencyCheck) -> Self {
        self.config.engine.dependency_check = mode;
        self
    }

    pub fn exponential_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.config.engine.backoff = BackoffKind::Exponential;
        self.config.engine.backoff_base_ms = base_ms;
        self.config.engine.backoff_max_ms = max_ms;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                priority: TaskPriority::default(),
                after: vec![],
                max_retries: 0,
                timeout_secs: 30,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.task.max_retries = n;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
