//! Deterministic fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cadence_runtime::{
    ControlError, ControlResult, Schedule, ScheduleParser, SequentialIdGenerator, TaskControl,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Fires every `step` seconds, aligned to the Unix epoch.
pub struct StepSchedule {
    step: i64,
}

impl Schedule for StepSchedule {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = after.timestamp();
        let next = (secs.div_euclid(self.step) + 1) * self.step;
        Utc.timestamp_opt(next, 0).single()
    }
}

/// Accepts expressions of the form `step:<seconds>`.
pub struct StepParser;

impl ScheduleParser for StepParser {
    fn parse(&self, expression: &str) -> ControlResult<Box<dyn Schedule>> {
        expression
            .strip_prefix("step:")
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|step| *step > 0)
            .map(|step| Box::new(StepSchedule { step }) as Box<dyn Schedule>)
            .ok_or_else(|| ControlError::InvalidSchedule(expression.to_string()))
    }
}

pub fn fake_control() -> TaskControl {
    TaskControl::new(Arc::new(StepParser), Arc::new(SequentialIdGenerator::new()))
}

pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, h, m, s).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}
