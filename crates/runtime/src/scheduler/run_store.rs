//! In-memory run store: active runs per task plus the finished-run archive.

use std::collections::{HashMap, HashSet};

use super::run_types::Run;
use crate::types::{ControlError, ControlResult, RunId, TaskId};

/// Holds every run the control core knows about.
///
/// Not synchronized on its own; callers hold the control guard.
#[derive(Debug, Default)]
pub struct RunStore {
    active: HashMap<TaskId, HashMap<RunId, Run>>,
    finished: HashMap<RunId, Run>,
    /// Every id ever accepted, so ids are never reused across the active/finished boundary.
    issued: HashSet<RunId>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `run_id` has ever been stored.
    pub fn is_issued(&self, run_id: RunId) -> bool {
        self.issued.contains(&run_id)
    }

    /// Add a freshly created run to its task's active set.
    pub fn insert_active(&mut self, run: Run) -> ControlResult<()> {
        if !self.issued.insert(run.id) {
            return Err(ControlError::DuplicateRun { run_id: run.id });
        }
        self.active
            .entry(run.task_id)
            .or_default()
            .insert(run.id, run);
        Ok(())
    }

    pub fn active_for(&self, task_id: TaskId) -> impl Iterator<Item = &Run> + '_ {
        self.active
            .get(&task_id)
            .into_iter()
            .flat_map(|runs| runs.values())
    }

    pub fn active_mut(&mut self, task_id: TaskId, run_id: RunId) -> Option<&mut Run> {
        self.active.get_mut(&task_id)?.get_mut(&run_id)
    }

    /// Remove a run from the active set, dropping the task's entry once empty.
    pub fn take_active(&mut self, task_id: TaskId, run_id: RunId) -> Option<Run> {
        let runs = self.active.get_mut(&task_id)?;
        let run = runs.remove(&run_id)?;
        if runs.is_empty() {
            self.active.remove(&task_id);
        }
        Some(run)
    }

    pub fn record_finished(&mut self, run: Run) {
        self.finished.insert(run.id, run);
    }

    pub fn finished(&self, run_id: RunId) -> Option<&Run> {
        self.finished.get(&run_id)
    }

    pub fn finished_runs(&self) -> impl Iterator<Item = &Run> + '_ {
        self.finished.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insert_and_take_active() {
        let mut store = RunStore::new();
        let task_id = TaskId::new();
        let run = Run::queued(task_id, RunId::new(), Utc::now());
        store.insert_active(run.clone()).unwrap();

        assert_eq!(store.active_for(task_id).count(), 1);
        assert_eq!(store.take_active(task_id, run.id), Some(run.clone()));
        assert_eq!(store.active_for(task_id).count(), 0);
        assert!(store.take_active(task_id, run.id).is_none());
        assert!(store.is_issued(run.id));
    }

    #[test]
    fn ids_are_never_reused_after_finishing() {
        let mut store = RunStore::new();
        let task_id = TaskId::new();
        let run = Run::queued(task_id, RunId::new(), Utc::now());
        store.insert_active(run.clone()).unwrap();
        let taken = store.take_active(task_id, run.id).unwrap();
        store.record_finished(taken);

        let err = store
            .insert_active(Run::queued(task_id, run.id, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, ControlError::DuplicateRun { .. }));
        assert!(store.finished(run.id).is_some());
    }

    #[test]
    fn active_sets_are_per_task() {
        let mut store = RunStore::new();
        let (a, b) = (TaskId::new(), TaskId::new());
        store
            .insert_active(Run::queued(a, RunId::new(), Utc::now()))
            .unwrap();
        store
            .insert_active(Run::queued(b, RunId::new(), Utc::now()))
            .unwrap();
        store
            .insert_active(Run::queued(b, RunId::new(), Utc::now()))
            .unwrap();
        assert_eq!(store.active_for(a).count(), 1);
        assert_eq!(store.active_for(b).count(), 2);
        assert_eq!(store.active_for(TaskId::new()).count(), 0);
    }
}
