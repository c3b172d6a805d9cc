//! FIFO backlog of operator-requested backfill runs.

use std::collections::VecDeque;

use super::run_types::ManualRun;
use crate::types::RunId;

/// Manual runs waiting to be created, served ahead of scheduled runs.
#[derive(Debug, Default)]
pub struct ManualRunQueue {
    entries: VecDeque<ManualRun>,
}

impl ManualRunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole backlog.
    pub fn replace(&mut self, runs: Vec<ManualRun>) {
        self.entries = runs.into();
    }

    /// Append one entry at the back.
    pub fn push(&mut self, run: ManualRun) {
        self.entries.push_back(run);
    }

    /// Look at the entry that will be served next.
    pub fn peek(&self) -> Option<&ManualRun> {
        self.entries.front()
    }

    /// Remove and return the entry at the front.
    pub fn pop(&mut self) -> Option<ManualRun> {
        self.entries.pop_front()
    }

    pub fn contains(&self, run_id: RunId) -> bool {
        self.entries.iter().any(|run| run.run_id == run_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot in service order.
    pub fn to_vec(&self) -> Vec<ManualRun> {
        self.entries.iter().cloned().collect()
    }
}
