// src/dag/index.rs

//! Dependency bookkeeping: which tasks are still waiting on what.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::task::TaskId;

/// Tracks unmet dependencies per waiting task and the set of completed tasks.
///
/// A waiting task is handed back by [`on_task_completed`](Self::on_task_completed)
/// exactly once: the moment its last unmet dependency completes. After that
/// it is no longer tracked, so promotion is idempotent by construction.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    /// Tasks whose action completed successfully. Only these satisfy
    /// dependencies.
    completed: BTreeSet<TaskId>,
    /// Tasks that failed terminally. They never satisfy dependencies.
    failed: BTreeSet<TaskId>,
    /// Waiting task -> dependencies not yet completed.
    unmet: HashMap<TaskId, HashSet<TaskId>>,
    /// Dependency -> tasks waiting on it.
    dependents: HashMap<TaskId, Vec<TaskId>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff every dependency has completed. An empty set is ready.
    pub fn is_ready(&self, dependencies: &BTreeSet<TaskId>) -> bool {
        dependencies.iter().all(|dep| self.completed.contains(dep))
    }

    /// Register a newly submitted task. Returns `true` if it is ready now.
    ///
    /// Dependencies that have not completed (including unknown IDs and the
    /// task itself) are recorded as unmet.
    pub fn register(&mut self, task: TaskId, dependencies: &BTreeSet<TaskId>) -> bool {
        let unmet: HashSet<TaskId> = dependencies
            .iter()
            .copied()
            .filter(|dep| !self.completed.contains(dep))
            .collect();

        if unmet.is_empty() {
            return true;
        }

        for dep in &unmet {
            self.dependents.entry(*dep).or_default().push(task);
        }
        debug!(task = %task, unmet = unmet.len(), "task waiting on dependencies");
        self.unmet.insert(task, unmet);
        false
    }

    /// Record a successful completion and return the waiting tasks that just
    /// became ready, in submission order.
    pub fn on_task_completed(&mut self, task: TaskId) -> Vec<TaskId> {
        if !self.completed.insert(task) {
            return Vec::new();
        }

        let mut ready = Vec::new();
        for waiting in self.dependents.remove(&task).unwrap_or_default() {
            let Some(remaining) = self.unmet.get_mut(&waiting) else {
                // Cancelled, or already promoted.
                continue;
            };
            remaining.remove(&task);
            if remaining.is_empty() {
                self.unmet.remove(&waiting);
                ready.push(waiting);
            }
        }

        ready.sort();
        ready.dedup();
        ready
    }

    /// Record a terminal failure. Dependents stay blocked.
    pub fn on_task_failed(&mut self, task: TaskId) {
        self.failed.insert(task);
    }

    /// Stop tracking a waiting task (e.g. it was cancelled).
    pub fn forget(&mut self, task: TaskId) {
        self.unmet.remove(&task);
    }

    /// Dependencies the task is still waiting on, if it is waiting at all.
    pub fn unmet_dependencies(&self, task: TaskId) -> Option<Vec<TaskId>> {
        let set = self.unmet.get(&task)?;
        let mut deps: Vec<TaskId> = set.iter().copied().collect();
        deps.sort();
        Some(deps)
    }

    pub fn completed(&self) -> &BTreeSet<TaskId> {
        &self.completed
    }

    pub fn failed(&self) -> &BTreeSet<TaskId> {
        &self.failed
    }

    pub fn waiting_count(&self) -> usize {
        self.unmet.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> BTreeSet<TaskId> {
        raw.iter().map(|n| TaskId(*n)).collect()
    }

    #[test]
    fn empty_dependency_set_is_ready_immediately() {
        let mut index = DependencyIndex::new();
        assert!(index.is_ready(&BTreeSet::new()));
        assert!(index.register(TaskId(1), &BTreeSet::new()));
        assert_eq!(index.waiting_count(), 0);
    }

    #[test]
    fn completion_promotes_dependent_once() {
        let mut index = DependencyIndex::new();
        assert!(!index.register(TaskId(2), &ids(&[1])));

        assert_eq!(index.on_task_completed(TaskId(1)), vec![TaskId(2)]);
        // Completing again must not promote twice.
        assert_eq!(index.on_task_completed(TaskId(1)), Vec::<TaskId>::new());
        assert_eq!(index.waiting_count(), 0);
    }

    #[test]
    fn shared_dependency_promotes_each_dependent_exactly_once() {
        let mut index = DependencyIndex::new();
        index.register(TaskId(2), &ids(&[1]));
        index.register(TaskId(3), &ids(&[1]));

        assert_eq!(index.on_task_completed(TaskId(1)), vec![TaskId(2), TaskId(3)]);
    }

    #[test]
    fn waits_for_all_dependencies() {
        let mut index = DependencyIndex::new();
        index.register(TaskId(3), &ids(&[1, 2]));

        assert!(index.on_task_completed(TaskId(1)).is_empty());
        assert_eq!(index.unmet_dependencies(TaskId(3)), Some(vec![TaskId(2)]));
        assert_eq!(index.on_task_completed(TaskId(2)), vec![TaskId(3)]);
    }

    #[test]
    fn already_completed_dependencies_are_not_waited_on() {
        let mut index = DependencyIndex::new();
        index.on_task_completed(TaskId(1));
        assert!(index.register(TaskId(2), &ids(&[1])));
    }

    #[test]
    fn failed_dependency_never_unblocks() {
        let mut index = DependencyIndex::new();
        index.register(TaskId(2), &ids(&[1]));
        index.on_task_failed(TaskId(1));

        assert!(index.failed().contains(&TaskId(1)));
        assert_eq!(index.unmet_dependencies(TaskId(2)), Some(vec![TaskId(1)]));
    }

    #[test]
    fn self_dependency_waits_forever() {
        let mut index = DependencyIndex::new();
        assert!(!index.register(TaskId(5), &ids(&[5])));
        assert_eq!(index.unmet_dependencies(TaskId(5)), Some(vec![TaskId(5)]));
    }

    #[test]
    fn forgotten_task_is_not_promoted() {
        let mut index = DependencyIndex::new();
        index.register(TaskId(2), &ids(&[1]));
        index.forget(TaskId(2));

        assert!(index.on_task_completed(TaskId(1)).is_empty());
    }
}
