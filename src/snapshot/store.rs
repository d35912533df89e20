//! In-memory task store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::task::{SnapshotTask, TaskStore};

/// Effect recorded by [`MemoryTaskStore`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreEvent {
    /// Progress persisted.
    NextStep(SnapshotTask),
    /// Final state persisted.
    EndTask {
        /// Task as persisted.
        task: SnapshotTask,
        /// Whether the task failed.
        failed: bool,
    },
}

#[derive(Debug, Default)]
struct State {
    tasks: BTreeMap<u32, SnapshotTask>,
    events: Vec<StoreEvent>,
}

/// Task store keeping the latest task per subscription in memory.
///
/// Clones share state, so a caller can keep a handle for inspection while the
/// orchestrator owns another.
#[derive(Clone, Debug, Default)]
pub struct MemoryTaskStore {
    state: Arc<Mutex<State>>,
}

impl MemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `task` as the current task of its subscription.
    pub fn insert(&self, task: SnapshotTask) {
        self.lock().tasks.insert(task.subscription, task);
    }

    /// Every effect persisted so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<StoreEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskStore for MemoryTaskStore {
    fn get_task(&self, subscription: u32) -> Option<SnapshotTask> {
        self.lock().tasks.get(&subscription).cloned()
    }

    fn next_step(&self, task: &SnapshotTask) {
        let mut state = self.lock();
        state.tasks.insert(task.subscription, task.clone());
        state.events.push(StoreEvent::NextStep(task.clone()));
    }

    fn end_task(&self, task: &SnapshotTask, failed: bool) {
        let mut state = self.lock();
        state.tasks.insert(task.subscription, task.clone());
        state.events.push(StoreEvent::EndTask {
            task: task.clone(),
            failed,
        });
    }
}
