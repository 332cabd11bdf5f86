// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WorkdagError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WorkdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let order = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.engine, raw.task, order))
    }
}

/// Validate `cfg` and return its task names in dependency order.
pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<Vec<String>> {
    ensure_has_tasks(cfg)?;
    validate_engine_section(cfg)?;
    validate_tasks(cfg)?;
    submission_order(cfg)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(WorkdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine_section(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.workers == 0 {
        return Err(WorkdagError::ConfigError(
            "[engine].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.idle_poll_ms == 0 {
        return Err(WorkdagError::ConfigError(
            "[engine].idle_poll_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.engine.backoff_base_ms > cfg.engine.backoff_max_ms {
        return Err(WorkdagError::ConfigError(format!(
            "[engine].backoff_base_ms ({}) must not exceed backoff_max_ms ({})",
            cfg.engine.backoff_base_ms, cfg.engine.backoff_max_ms
        )));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(WorkdagError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
        for dep in task.after.iter() {
            if dep == name {
                return Err(WorkdagError::ConfigError(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(WorkdagError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn submission_order(cfg: &RawConfigFile) -> Result<Vec<String>> {
    // Edge direction: dep -> task, so a topological order submits
    // dependencies first.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(WorkdagError::DependencyCycle(format!(
            "cycle detected in task configuration involving task '{}'",
            cycle.node_id()
        ))),
    }
}
