//! Index of runs that were created but have not finished yet.

use std::collections::HashMap;

use super::run_types::QueuedRun;
use crate::types::{RunId, TaskId};

#[derive(Debug, Default)]
pub struct CreatedRegistry {
    entries: HashMap<(TaskId, RunId), QueuedRun>,
}

impl CreatedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created run. Returns `false` if the pair was already present.
    pub fn insert(&mut self, run: QueuedRun) -> bool {
        self.entries
            .insert((run.task_id, run.run_id), run)
            .is_none()
    }

    pub fn remove(&mut self, task_id: TaskId, run_id: RunId) -> Option<QueuedRun> {
        self.entries.remove(&(task_id, run_id))
    }

    pub fn for_task(&self, task_id: TaskId) -> Vec<QueuedRun> {
        self.entries
            .values()
            .filter(|run| run.task_id == task_id)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
