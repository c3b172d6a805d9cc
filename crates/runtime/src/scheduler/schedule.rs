//! Schedule evaluation and next-due computation.
//!
//! Cron parsing is an injected capability ([`ScheduleParser`]) so the
//! calculator can be exercised against deterministic fakes. The default
//! [`CronScheduleParser`] wraps the `cron` crate.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};

use super::run_types::Run;
use crate::types::{ControlError, ControlResult, Task};

/// A parsed recurrence rule.
pub trait Schedule: Send + Sync {
    /// First occurrence strictly after `after`, or `None` when exhausted.
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Turns task fields into schedules and offsets.
pub trait ScheduleParser: Send + Sync {
    fn parse(&self, expression: &str) -> ControlResult<Box<dyn Schedule>>;

    /// Parse an offset literal. `None` means "no usable offset" and is read
    /// as zero by the calculator.
    fn parse_offset(&self, literal: &str) -> Option<Duration> {
        parse_offset(literal)
    }
}

/// Parse a duration literal such as `"5m"`, `"1h 30m"` or `"-90s"`.
///
/// The magnitude uses `humantime` syntax; a leading `-` makes the offset
/// negative, moving the due time before the slot.
pub fn parse_offset(literal: &str) -> Option<Duration> {
    let literal = literal.trim();
    let (negative, magnitude) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal.strip_prefix('+').unwrap_or(literal)),
    };
    if magnitude.is_empty() {
        return None;
    }
    let parsed = Duration::from_std(humantime::parse_duration(magnitude).ok()?).ok()?;
    Some(if negative { -parsed } else { parsed })
}

/// `cron`-crate backed parser.
///
/// Five-field expressions are read as classic crontab: they get a leading
/// seconds field of `0` and their day-of-week numbers (0 or 7 = Sunday) are
/// shifted to the `cron` crate's numbering (1 = Sunday). Six and seven field
/// expressions use the `cron` crate's dialect unchanged. `@every <duration>`
/// yields a fixed-interval schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronScheduleParser;

impl ScheduleParser for CronScheduleParser {
    fn parse(&self, expression: &str) -> ControlResult<Box<dyn Schedule>> {
        let expression = expression.trim();
        if let Some(every) = expression.strip_prefix("@every") {
            let interval = parse_offset(every)
                .filter(|d| *d > Duration::zero())
                .ok_or_else(|| {
                    ControlError::InvalidSchedule(format!("bad interval in {expression:?}"))
                })?;
            return Ok(Box::new(EverySchedule { interval }));
        }

        let normalized = normalize_fields(expression)?;
        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| ControlError::InvalidSchedule(format!("{expression:?}: {e}")))?;
        Ok(Box::new(CronSchedule(schedule)))
    }
}

fn normalize_fields(expression: &str) -> ControlResult<Cow<'_, str>> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Ok(Cow::Borrowed(expression));
    }
    let weekdays = crontab_weekdays(fields[4]).ok_or_else(|| {
        ControlError::InvalidSchedule(format!("{expression:?}: bad day-of-week field"))
    })?;
    Ok(Cow::Owned(format!("0 {} {weekdays}", fields[..4].join(" "))))
}

/// Rewrite a crontab day-of-week field for the `cron` crate.
///
/// Numeric items (values, ranges, stepped ranges) become explicit lists.
/// `*`, `?` and named days already mean the same thing in both dialects.
fn crontab_weekdays(field: &str) -> Option<String> {
    let items = field
        .split(',')
        .map(|item| {
            if item.starts_with(['*', '?']) || item.chars().any(|c| c.is_ascii_alphabetic()) {
                return Some(item.to_string());
            }
            let (range, step) = match item.split_once('/') {
                Some((range, step)) => (range, Some(step.parse::<usize>().ok().filter(|s| *s > 0)?)),
                None => (item, None),
            };
            let (start, end) = match range.split_once('-') {
                Some((a, b)) => (a.parse::<u8>().ok()?, b.parse::<u8>().ok()?),
                None => {
                    let start = range.parse::<u8>().ok()?;
                    (start, if step.is_some() { 6 } else { start })
                }
            };
            if start > end || end > 7 {
                return None;
            }
            let days: BTreeSet<u8> = (start..=end)
                .step_by(step.unwrap_or(1))
                .map(|day| day % 7 + 1)
                .collect();
            Some(
                days.iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
            )
        })
        .collect::<Option<Vec<_>>>()?;
    Some(items.join(","))
}

struct CronSchedule(cron::Schedule);

impl Schedule for CronSchedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.0.after(&after).next()
    }
}

/// Fires every `interval`, counted from the reference instant truncated to the second.
struct EverySchedule {
    interval: Duration,
}

impl Schedule for EverySchedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        after
            .with_nanosecond(0)?
            .checked_add_signed(self.interval)
    }
}

/// A schedule slot: the instant a run stands for, and when it becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueSlot {
    pub scheduled_for: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// A task's parsed schedule together with its resolved offset.
pub struct TaskSchedule {
    expression: String,
    schedule: Box<dyn Schedule>,
    offset: Duration,
}

impl TaskSchedule {
    pub fn for_task(parser: &dyn ScheduleParser, task: &Task) -> ControlResult<Self> {
        let schedule = parser.parse(&task.cron)?;
        let offset = task
            .offset
            .as_deref()
            .and_then(|literal| parser.parse_offset(literal))
            .unwrap_or_else(Duration::zero);
        Ok(Self {
            expression: task.cron.clone(),
            schedule,
            offset,
        })
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// The first slot strictly after `latest`.
    pub fn slot_after(&self, latest: DateTime<Utc>) -> ControlResult<DueSlot> {
        let scheduled_for = self.schedule.next_after(latest).ok_or_else(|| {
            ControlError::InvalidSchedule(format!(
                "{:?} has no occurrence after {latest}",
                self.expression
            ))
        })?;
        let due_at = scheduled_for
            .checked_add_signed(self.offset)
            .ok_or_else(|| {
                ControlError::InvalidSchedule(format!(
                    "offset pushes {scheduled_for} out of range"
                ))
            })?;
        Ok(DueSlot {
            scheduled_for,
            due_at,
        })
    }

    /// The next slot for `task` given its currently active runs.
    pub fn next_due<'a>(
        &self,
        task: &Task,
        active: impl IntoIterator<Item = &'a Run>,
    ) -> ControlResult<DueSlot> {
        self.slot_after(watermark(task, active))
    }
}

/// The latest instant already covered for a task: its completion watermark
/// or the newest active run, whichever is later. Falls back to the Unix epoch.
pub fn watermark<'a>(task: &Task, active: impl IntoIterator<Item = &'a Run>) -> DateTime<Utc> {
    active
        .into_iter()
        .map(|run| run.scheduled_for)
        .chain(task.latest_completed_at())
        .max()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Compute when the next run of `task` becomes due.
pub fn next_due<'a>(
    parser: &dyn ScheduleParser,
    task: &Task,
    active: impl IntoIterator<Item = &'a Run>,
) -> ControlResult<DateTime<Utc>> {
    Ok(TaskSchedule::for_task(parser, task)?
        .next_due(task, active)?
        .due_at)
}
