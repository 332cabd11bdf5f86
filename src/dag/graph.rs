// src/dag/graph.rs

//! Optional submission-time validation of dependency sets.

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, WorkdagError};
use crate::task::TaskId;
use crate::types::DependencyCheck;

/// Check a new task's dependencies against the already known tasks.
///
/// `known` yields every registered task with its dependency set.
///
/// Edge direction: dependency -> dependent. For a new task `C` that depends
/// on `A`, we add the edge `A -> C`.
pub fn check_dependencies<'a>(
    mode: DependencyCheck,
    task: TaskId,
    dependencies: &BTreeSet<TaskId>,
    known: impl IntoIterator<Item = (TaskId, &'a BTreeSet<TaskId>)>,
) -> Result<()> {
    if mode == DependencyCheck::Off {
        return Ok(());
    }

    if dependencies.contains(&task) {
        return Err(WorkdagError::DependencyCycle(format!(
            "task '{task}' cannot depend on itself"
        )));
    }

    let mut graph: DiGraphMap<TaskId, ()> = DiGraphMap::new();
    let mut registered = BTreeSet::new();
    for (id, deps) in known {
        registered.insert(id);
        graph.add_node(id);
        for dep in deps {
            graph.add_edge(*dep, id, ());
        }
    }

    if mode == DependencyCheck::Strict {
        if let Some(unknown) = dependencies.iter().find(|dep| !registered.contains(*dep)) {
            return Err(WorkdagError::UnknownDependency {
                task: task.to_string(),
                dependency: unknown.to_string(),
            });
        }
    }

    graph.add_node(task);
    for dep in dependencies {
        graph.add_edge(*dep, task, ());
    }

    // A topological sort fails if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(WorkdagError::DependencyCycle(format!(
            "cycle detected in task dependencies involving task '{}'",
            cycle.node_id()
        ))),
    }
}
