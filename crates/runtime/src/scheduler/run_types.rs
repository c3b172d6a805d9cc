//! Shared types for run bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{RunId, TaskId};

/// Lifecycle status of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, waiting for an executor.
    #[default]
    Queued,
    /// Picked up by an executor.
    Started,
    Success,
    Failed,
    Canceled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Success | RunStatus::Failed | RunStatus::Canceled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            RunStatus::Queued => 0,
            RunStatus::Started => 1,
            RunStatus::Success | RunStatus::Failed | RunStatus::Canceled => 2,
        }
    }

    /// Whether a run in `self` may move to `next`. Statuses only move forward,
    /// and nothing leaves a terminal status.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "queued"),
            RunStatus::Started => write!(f, "started"),
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "started" => Ok(RunStatus::Started),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "canceled" => Ok(RunStatus::Canceled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One line of a run's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub message: String,
}

/// Record of a single task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub task_id: TaskId,
    /// The schedule instant this run stands for, independent of when it was created.
    pub scheduled_for: DateTime<Utc>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log: Vec<LogEntry>,
}

impl Run {
    pub fn queued(task_id: TaskId, id: RunId, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id,
            task_id,
            scheduled_for,
            status: RunStatus::Queued,
            started_at: None,
            finished_at: None,
            log: Vec::new(),
        }
    }
}

/// An operator-requested backfill run waiting in the manual queue.
///
/// `scheduled_for` is kept as submitted; an entry whose timestamp does not
/// parse is skipped in favour of the regular schedule when dequeued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRun {
    pub run_id: RunId,
    pub scheduled_for: String,
}

impl ManualRun {
    pub fn new(run_id: RunId, scheduled_for: impl Into<String>) -> Self {
        Self {
            run_id,
            scheduled_for: scheduled_for.into(),
        }
    }
}

/// Handle returned to the creator of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueuedRun {
    pub task_id: TaskId,
    pub run_id: RunId,
    /// The schedule instant the run was created for.
    pub now: DateTime<Utc>,
}

/// Outcome of a successful creation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCreation {
    pub created: QueuedRun,
    /// When the next creation call for this task becomes worthwhile (offset applied).
    pub next_due: DateTime<Utc>,
    /// Whether the manual queue still holds entries.
    pub has_queue: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_default_is_queued() {
        assert_eq!(RunStatus::default(), RunStatus::Queued);
    }

    #[test]
    fn run_status_display_roundtrip() {
        for status in [
            RunStatus::Queued,
            RunStatus::Started,
            RunStatus::Success,
            RunStatus::Failed,
            RunStatus::Canceled,
        ] {
            let parsed: RunStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn transitions_only_move_forward() {
        use RunStatus::*;
        assert!(Queued.can_transition_to(Started));
        assert!(Queued.can_transition_to(Canceled));
        assert!(Started.can_transition_to(Success));
        assert!(Started.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Queued));
        assert!(!Started.can_transition_to(Started));
        assert!(!Started.can_transition_to(Queued));
        for terminal in [Success, Failed, Canceled] {
            for next in [Queued, Started, Success, Failed, Canceled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn run_serialization_uses_snake_case_status() {
        let run = Run::queued(TaskId::new(), RunId::new(), Utc::now());
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "queued");
        let back: Run = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }
}
