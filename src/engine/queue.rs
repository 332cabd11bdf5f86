// src/engine/queue.rs

//! Priority-ordered queue of tasks whose dependencies are satisfied.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::engine::lock;
use crate::task::{TaskId, TaskPriority};

/// Heap entry. `BinaryHeap` is a max-heap, so `Ord` is inverted: the entry
/// with the lowest priority ordinal and then the lowest sequence number
/// compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    priority: TaskPriority,
    seq: u64,
    task: TaskId,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An entry that may not be handed out before `due`.
#[derive(Debug)]
struct Deferred {
    due: Instant,
    priority: TaskPriority,
    task: TaskId,
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    deferred: Vec<Deferred>,
    next_seq: u64,
}

impl QueueState {
    fn push_now(&mut self, task: TaskId, priority: TaskPriority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority,
            seq,
            task,
        });
    }

    /// Move every deferred entry whose time has come into the heap, in due
    /// order so that FIFO among equal priorities follows readiness time.
    fn promote_due(&mut self, now: Instant) {
        if self.deferred.is_empty() {
            return;
        }
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.deferred.drain(..).partition(|d| d.due <= now);
        self.deferred = pending;

        due.sort_by_key(|d| d.due);
        for d in due {
            trace!(task = %d.task, "deferred entry is now due");
            self.push_now(d.task, d.priority);
        }
    }
}

/// Concurrency-safe ready queue.
///
/// Ordering: priority ordinal ascending, then insertion order. Pops never
/// block; idle workers call [`wait_for_work`](Self::wait_for_work) which
/// returns on the next push or after a bounded interval, whichever comes
/// first.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task that is ready to run now.
    pub fn push(&self, task: TaskId, priority: TaskPriority) {
        {
            let mut state = lock(&self.state);
            state.push_now(task, priority);
            debug!(task = %task, %priority, depth = state.heap.len(), "task enqueued");
        }
        self.notify.notify_one();
    }

    /// Insert a task that becomes eligible after `delay`.
    pub fn push_after(&self, task: TaskId, priority: TaskPriority, delay: Duration) {
        if delay.is_zero() {
            self.push(task, priority);
            return;
        }
        let mut state = lock(&self.state);
        state.deferred.push(Deferred {
            due: Instant::now() + delay,
            priority,
            task,
        });
        debug!(task = %task, ?delay, "task enqueued with delay");
    }

    /// Pop the highest-priority ready task, if any. Never blocks.
    pub fn try_pop(&self) -> Option<TaskId> {
        let mut state = lock(&self.state);
        state.promote_due(Instant::now());
        state.heap.pop().map(|entry| entry.task)
    }

    /// Drop every ready or deferred entry for `task`. Returns how many were
    /// removed.
    pub fn remove(&self, task: TaskId) -> usize {
        let mut state = lock(&self.state);
        let before = state.heap.len() + state.deferred.len();
        state.heap.retain(|entry| entry.task != task);
        state.deferred.retain(|d| d.task != task);
        let removed = before - state.heap.len() - state.deferred.len();
        if removed > 0 {
            debug!(task = %task, removed, "queue entries removed");
        }
        removed
    }

    /// Wait until something is pushed or `idle` elapses.
    pub async fn wait_for_work(&self, idle: Duration) {
        let _ = tokio::time::timeout(idle, self.notify.notified()).await;
    }

    /// Number of tasks that can be popped right now.
    pub fn len(&self) -> usize {
        let mut state = lock(&self.state);
        state.promote_due(Instant::now());
        state.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries still waiting for their delay to pass.
    pub fn deferred_len(&self) -> usize {
        lock(&self.state).deferred.len()
    }

    /// Ready plus deferred entries.
    pub fn total_len(&self) -> usize {
        let state = lock(&self.state);
        state.heap.len() + state.deferred.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &ReadyQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.try_pop()).map(|id| id.0).collect()
    }

    #[test]
    fn pops_by_priority_then_fifo() {
        let q = ReadyQueue::new();
        q.push(TaskId(1), TaskPriority::Low);
        q.push(TaskId(2), TaskPriority::Critical);
        q.push(TaskId(3), TaskPriority::Medium);
        q.push(TaskId(4), TaskPriority::Critical);
        q.push(TaskId(5), TaskPriority::Background);
        q.push(TaskId(6), TaskPriority::Medium);

        assert_eq!(drain(&q), vec![2, 4, 3, 6, 1, 5]);
        assert!(q.is_empty());
    }

    #[test]
    fn empty_queue_returns_none_immediately() {
        let q = ReadyQueue::new();
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn deferred_entries_are_held_back_until_due() {
        let q = ReadyQueue::new();
        q.push_after(TaskId(1), TaskPriority::Critical, Duration::from_secs(60));
        q.push(TaskId(2), TaskPriority::Low);

        assert_eq!(q.len(), 1);
        assert_eq!(q.deferred_len(), 1);
        assert_eq!(q.total_len(), 2);
        assert_eq!(q.try_pop(), Some(TaskId(2)));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn zero_delay_is_an_immediate_push() {
        let q = ReadyQueue::new();
        q.push_after(TaskId(1), TaskPriority::High, Duration::ZERO);
        assert_eq!(q.deferred_len(), 0);
        assert_eq!(q.try_pop(), Some(TaskId(1)));
    }

    #[test]
    fn remove_drops_ready_and_deferred_entries() {
        let q = ReadyQueue::new();
        q.push(TaskId(1), TaskPriority::High);
        q.push(TaskId(2), TaskPriority::Low);
        q.push_after(TaskId(3), TaskPriority::Critical, Duration::from_secs(3600));

        assert_eq!(q.remove(TaskId(3)), 1);
        assert_eq!(q.deferred_len(), 0);
        assert_eq!(q.remove(TaskId(1)), 1);
        assert_eq!(q.remove(TaskId(1)), 0);

        assert_eq!(q.total_len(), 1);
        assert_eq!(q.try_pop(), Some(TaskId(2)));
    }

    #[tokio::test]
    async fn deferred_entry_becomes_poppable() {
        let q = ReadyQueue::new();
        q.push_after(TaskId(1), TaskPriority::High, Duration::from_millis(20));
        assert_eq!(q.try_pop(), None);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(q.try_pop(), Some(TaskId(1)));
    }

    #[tokio::test]
    async fn push_wakes_a_waiting_worker() {
        let q = std::sync::Arc::new(ReadyQueue::new());
        let waiter = {
            let q = std::sync::Arc::clone(&q);
            tokio::spawn(async move {
                let started = Instant::now();
                q.wait_for_work(Duration::from_secs(10)).await;
                started.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        q.push(TaskId(1), TaskPriority::Medium);

        let waited = waiter.await.unwrap();
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn concurrent_pops_never_hand_out_the_same_task() {
        let q = std::sync::Arc::new(ReadyQueue::new());
        for n in 0..1000 {
            q.push(TaskId(n), TaskPriority::Medium);
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = std::sync::Arc::clone(&q);
                std::thread::spawn(move || std::iter::from_fn(|| q.try_pop()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen: Vec<TaskId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 1000);
    }
}
