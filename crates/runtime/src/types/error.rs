//! Error types for the run-control core

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{RunId, TaskId};
use crate::scheduler::run_types::RunStatus;

/// Errors surfaced by [`TaskControl`](crate::scheduler::TaskControl).
///
/// Two classes share this type. `RunNotYetDue` is an expected control
/// signal the caller reschedules on. `TaskNotRegistered`, `RunNotFound`,
/// `InvalidTransition` and `DuplicateRun` are invariant violations: they
/// mean the caller is broken, and [`ControlError::is_invariant_violation`]
/// lets a host escalate them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("invalid task id")]
    InvalidTaskId,

    #[error("task not registered: {task_id}")]
    TaskNotRegistered { task_id: TaskId },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("run not yet due; next run due at {due_at}")]
    RunNotYetDue { due_at: DateTime<Utc> },

    #[error("run {run_id} not found for task {task_id}")]
    RunNotFound { task_id: TaskId, run_id: RunId },

    #[error("run {run_id} cannot move from {from} to {to}")]
    InvalidTransition {
        run_id: RunId,
        from: RunStatus,
        to: RunStatus,
    },

    #[error("run id {run_id} was already issued")]
    DuplicateRun { run_id: RunId },
}

impl ControlError {
    /// True for errors that indicate a caller bug rather than a runtime condition.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            ControlError::TaskNotRegistered { .. }
                | ControlError::RunNotFound { .. }
                | ControlError::InvalidTransition { .. }
                | ControlError::DuplicateRun { .. }
        )
    }

    pub fn is_not_yet_due(&self) -> bool {
        matches!(self, ControlError::RunNotYetDue { .. })
    }

    /// The due time carried by a `RunNotYetDue` signal.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ControlError::RunNotYetDue { due_at } => Some(*due_at),
            _ => None,
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;
