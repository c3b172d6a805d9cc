//! Guarded run-control core.
//!
//! `TaskControl` owns the task registry, the run store, the manual queue,
//! the created-run registry and the per-task creation counters. All of it
//! sits behind one `parking_lot::Mutex`, held for the full duration of every
//! public operation, so run creation is atomic per due slot and lifecycle
//! updates are linearizable per run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::ids::{IdGenerator, UuidGenerator};
use super::lifecycle;
use super::manual_queue::ManualRunQueue;
use super::registry::CreatedRegistry;
use super::run_store::RunStore;
use super::run_types::{ManualRun, QueuedRun, Run, RunCreation, RunStatus};
use super::schedule::{watermark, CronScheduleParser, ScheduleParser, TaskSchedule};
use crate::types::{parse_timestamp, ControlError, ControlResult, RunId, Task, TaskId};

#[derive(Default)]
struct ControlState {
    tasks: HashMap<TaskId, Task>,
    runs: RunStore,
    manual: ManualRunQueue,
    created: CreatedRegistry,
    total_created: HashMap<TaskId, u64>,
}

/// Creates runs for registered tasks and tracks them until they finish.
///
/// Shared between a scheduling driver (calling [`create_next_run`](Self::create_next_run))
/// and executors (calling the lifecycle operations); wrap it in an `Arc`.
pub struct TaskControl {
    state: Mutex<ControlState>,
    parser: Arc<dyn ScheduleParser>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskControl {
    pub fn new(parser: Arc<dyn ScheduleParser>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            parser,
            ids,
        }
    }

    /// Cron parsing via the `cron` crate and random v4 run ids.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(CronScheduleParser), Arc::new(UuidGenerator))
    }

    // ── Task registry ─────────────────────────────────────────────────

    /// Register `task`, replacing any earlier record with the same id.
    /// Must happen before the first `create_next_run` for that id.
    pub fn set_task(&self, task: Task) {
        if task.latest_completed.is_some() && task.latest_completed_at().is_none() {
            tracing::warn!(
                task_id = %task.id,
                latest_completed = ?task.latest_completed,
                "unparsable latest_completed, treating task as never completed"
            );
        }
        if let Some(offset) = task.offset.as_deref() {
            if !offset.trim().is_empty() && self.parser.parse_offset(offset).is_none() {
                tracing::warn!(task_id = %task.id, offset, "unparsable offset, using zero");
            }
        }
        tracing::debug!(task_id = %task.id, cron = %task.cron, "task registered");
        self.state.lock().tasks.insert(task.id, task);
    }

    /// Snapshot of a registered task, including its current watermark.
    pub fn task(&self, task_id: TaskId) -> Option<Task> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.state.lock().tasks.keys().copied().collect()
    }

    // ── Manual queue ──────────────────────────────────────────────────

    /// Replace the manual backlog.
    pub fn set_manual_runs(&self, runs: Vec<ManualRun>) {
        tracing::info!(count = runs.len(), "manual run queue replaced");
        self.state.lock().manual.replace(runs);
    }

    /// Append one backfill request. Rejects ids that were already issued or queued.
    pub fn push_manual_run(&self, run: ManualRun) -> ControlResult<()> {
        let mut state = self.state.lock();
        if state.runs.is_issued(run.run_id) || state.manual.contains(run.run_id) {
            return Err(violation(ControlError::DuplicateRun { run_id: run.run_id }));
        }
        tracing::info!(run_id = %run.run_id, scheduled_for = %run.scheduled_for, "manual run queued");
        state.manual.push(run);
        Ok(())
    }

    // ── Run creation ──────────────────────────────────────────────────

    /// Create the next run for `task_id`.
    ///
    /// Queued manual runs are served first and ignore `now`. Otherwise a run
    /// is created only when the next slot is due, and `RunNotYetDue` carries
    /// the instant at which calling again makes sense.
    pub fn create_next_run(
        &self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> ControlResult<RunCreation> {
        if !task_id.is_valid() {
            return Err(ControlError::InvalidTaskId);
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let task = state
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| violation(ControlError::TaskNotRegistered { task_id }))?;
        let schedule = TaskSchedule::for_task(self.parser.as_ref(), &task)?;

        let creation = match Self::create_manual_run(state, &task, &schedule)? {
            Some(creation) => creation,
            None => self.create_scheduled_run(state, &task, &schedule, now)?,
        };

        let fresh = state.created.insert(creation.created);
        debug_assert!(fresh, "created-run registry already held {creation:?}");
        *state.total_created.entry(task_id).or_insert(0) += 1;

        tracing::info!(
            task_id = %task_id,
            run_id = %creation.created.run_id,
            scheduled_for = %creation.created.now,
            next_due = %creation.next_due,
            has_queue = creation.has_queue,
            "run created"
        );
        Ok(creation)
    }

    fn create_manual_run(
        state: &mut ControlState,
        task: &Task,
        schedule: &TaskSchedule,
    ) -> ControlResult<Option<RunCreation>> {
        let Some(front) = state.manual.peek() else {
            return Ok(None);
        };
        let run_id = front.run_id;

        let Some(scheduled_for) = parse_timestamp(&front.scheduled_for) else {
            tracing::warn!(
                task_id = %task.id,
                run_id = %run_id,
                scheduled_for = %front.scheduled_for,
                "dropping manual run with malformed scheduled_for, falling back to schedule"
            );
            state.manual.pop();
            return Ok(None);
        };

        if state.runs.is_issued(run_id) {
            state.manual.pop();
            return Err(violation(ControlError::DuplicateRun { run_id }));
        }

        // Computed before dequeuing so a schedule error leaves the backlog intact.
        let latest = watermark(task, state.runs.active_for(task.id)).max(scheduled_for);
        let next = schedule.slot_after(latest)?;

        state.manual.pop();
        state
            .runs
            .insert_active(Run::queued(task.id, run_id, scheduled_for))
            .map_err(violation)?;

        Ok(Some(RunCreation {
            created: QueuedRun {
                task_id: task.id,
                run_id,
                now: scheduled_for,
            },
            next_due: next.due_at,
            has_queue: !state.manual.is_empty(),
        }))
    }

    fn create_scheduled_run(
        &self,
        state: &mut ControlState,
        task: &Task,
        schedule: &TaskSchedule,
        now: DateTime<Utc>,
    ) -> ControlResult<RunCreation> {
        let slot = schedule.next_due(task, state.runs.active_for(task.id))?;
        if slot.due_at > now {
            tracing::debug!(task_id = %task.id, due_at = %slot.due_at, %now, "run not yet due");
            return Err(ControlError::RunNotYetDue {
                due_at: slot.due_at,
            });
        }

        let following = schedule.slot_after(slot.scheduled_for)?;
        let run_id = self.ids.next_run_id();
        state
            .runs
            .insert_active(Run::queued(task.id, run_id, slot.scheduled_for))
            .map_err(violation)?;

        Ok(RunCreation {
            created: QueuedRun {
                task_id: task.id,
                run_id,
                now: slot.scheduled_for,
            },
            next_due: following.due_at,
            has_queue: false,
        })
    }

    /// When the next `create_next_run` call for `task_id` would succeed,
    /// ignoring the manual queue.
    pub fn next_due_run(&self, task_id: TaskId) -> ControlResult<DateTime<Utc>> {
        let state = self.state.lock();
        let task = state
            .tasks
            .get(&task_id)
            .ok_or_else(|| violation(ControlError::TaskNotRegistered { task_id }))?;
        let schedule = TaskSchedule::for_task(self.parser.as_ref(), task)?;
        Ok(schedule.next_due(task, state.runs.active_for(task_id))?.due_at)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Record a status change reported by an executor.
    pub fn update_run_state(
        &self,
        task_id: TaskId,
        run_id: RunId,
        when: DateTime<Utc>,
        status: RunStatus,
    ) -> ControlResult<()> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .active_mut(task_id, run_id)
            .ok_or_else(|| violation(ControlError::RunNotFound { task_id, run_id }))?;
        lifecycle::apply_status(run, status, when).map_err(violation)?;
        tracing::debug!(%task_id, %run_id, %status, %when, "run state updated");
        Ok(())
    }

    /// Append a log line to an active run.
    pub fn add_run_log(
        &self,
        task_id: TaskId,
        run_id: RunId,
        when: DateTime<Utc>,
        message: impl Into<String>,
    ) -> ControlResult<()> {
        let mut state = self.state.lock();
        let run = state
            .runs
            .active_mut(task_id, run_id)
            .ok_or_else(|| violation(ControlError::RunNotFound { task_id, run_id }))?;
        lifecycle::append_log(run, when, message.into());
        Ok(())
    }

    /// Retire an active run: advance the task watermark, archive the run and
    /// drop its created-run registry entry. Returns the finished snapshot.
    pub fn finish_run(&self, task_id: TaskId, run_id: RunId) -> ControlResult<Run> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let run = state
            .runs
            .take_active(task_id, run_id)
            .ok_or_else(|| violation(ControlError::RunNotFound { task_id, run_id }))?;

        let advanced = state
            .tasks
            .get_mut(&task_id)
            .map(|task| lifecycle::advance_watermark(task, run.scheduled_for))
            .unwrap_or(false);
        state.created.remove(task_id, run_id);
        state.runs.record_finished(run.clone());

        tracing::info!(
            %task_id,
            %run_id,
            status = %run.status,
            scheduled_for = %run.scheduled_for,
            watermark_advanced = advanced,
            "run finished"
        );
        Ok(run)
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Active (created, unfinished) runs of a task.
    pub fn currently_running(&self, task_id: TaskId) -> Vec<Run> {
        self.state
            .lock()
            .runs
            .active_for(task_id)
            .cloned()
            .collect()
    }

    /// The manual backlog. The queue is shared by every task of this core,
    /// so the same contents are returned for any `task_id`.
    pub fn manual_runs(&self, _task_id: TaskId) -> Vec<ManualRun> {
        self.state.lock().manual.to_vec()
    }

    /// Created-run registry entries of a task.
    pub fn created_for(&self, task_id: TaskId) -> Vec<QueuedRun> {
        self.state.lock().created.for_task(task_id)
    }

    pub fn total_runs_created_for_task(&self, task_id: TaskId) -> u64 {
        self.state
            .lock()
            .total_created
            .get(&task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn finished_run(&self, run_id: RunId) -> Option<Run> {
        self.state.lock().runs.finished(run_id).cloned()
    }

    pub fn finished_runs(&self) -> Vec<Run> {
        self.state.lock().runs.finished_runs().cloned().collect()
    }
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn violation(err: ControlError) -> ControlError {
    tracing::error!(error = %err, "run-control invariant violated");
    err
}
