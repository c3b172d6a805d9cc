//! Run state transitions, log appends and watermark advancement.

use chrono::{DateTime, Utc};

use super::run_types::{LogEntry, Run, RunStatus};
use crate::types::{format_timestamp, ControlError, ControlResult, Task};

/// Move `run` to `status` at `when`, stamping started/finished times.
pub fn apply_status(run: &mut Run, status: RunStatus, when: DateTime<Utc>) -> ControlResult<()> {
    if !run.status.can_transition_to(status) {
        return Err(ControlError::InvalidTransition {
            run_id: run.id,
            from: run.status,
            to: status,
        });
    }
    run.status = status;
    match status {
        RunStatus::Started => run.started_at = Some(when),
        s if s.is_terminal() => run.finished_at = Some(when),
        _ => {}
    }
    Ok(())
}

pub fn append_log(run: &mut Run, when: DateTime<Utc>, message: String) {
    run.log.push(LogEntry {
        time: when,
        message,
    });
}

/// Raise the task's watermark to `scheduled_for` if that is strictly later.
/// An unparsable watermark counts as never completed. Returns whether it moved.
pub fn advance_watermark(task: &mut Task, scheduled_for: DateTime<Utc>) -> bool {
    match task.latest_completed_at() {
        Some(current) if scheduled_for <= current => false,
        _ => {
            task.latest_completed = Some(format_timestamp(scheduled_for));
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunId, TaskId};
    use chrono::{Duration, TimeZone};

    fn fresh_run() -> Run {
        Run::queued(
            TaskId::new(),
            RunId::new(),
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn started_then_success_stamps_both_times() {
        let mut run = fresh_run();
        let start = Utc::now();
        let end = start + Duration::seconds(3);

        apply_status(&mut run, RunStatus::Started, start).unwrap();
        assert_eq!(run.started_at, Some(start));
        assert_eq!(run.finished_at, None);

        apply_status(&mut run, RunStatus::Success, end).unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.finished_at, Some(end));
    }

    #[test]
    fn cancel_before_start_only_sets_finished_at() {
        let mut run = fresh_run();
        apply_status(&mut run, RunStatus::Canceled, Utc::now()).unwrap();
        assert!(run.started_at.is_none());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn terminal_status_is_final() {
        let mut run = fresh_run();
        apply_status(&mut run, RunStatus::Failed, Utc::now()).unwrap();
        let before = run.clone();

        let err = apply_status(&mut run, RunStatus::Started, Utc::now()).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(run, before);
    }

    #[test]
    fn log_keeps_call_order() {
        let mut run = fresh_run();
        let t = Utc::now();
        append_log(&mut run, t + Duration::seconds(1), "second clock, first call".into());
        append_log(&mut run, t, "first clock, second call".into());
        let messages: Vec<_> = run.log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["second clock, first call", "first clock, second call"]);
    }

    #[test]
    fn watermark_only_moves_forward() {
        let mut task = Task::new(TaskId::new(), "* * * * *");
        let early = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let late = early + Duration::minutes(5);

        assert!(advance_watermark(&mut task, late));
        assert_eq!(task.latest_completed_at(), Some(late));
        assert!(!advance_watermark(&mut task, early));
        assert!(!advance_watermark(&mut task, late));
        assert_eq!(task.latest_completed_at(), Some(late));
    }

    #[test]
    fn unparsable_watermark_is_replaced() {
        let mut task = Task::new(TaskId::new(), "* * * * *").with_latest_completed("garbage");
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert!(advance_watermark(&mut task, at));
        assert_eq!(task.latest_completed.as_deref(), Some("2021-01-01T00:00:00Z"));
    }
}
