//! Core types and data structures for the run-control core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::*;

/// Unique identifier for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil identifier, which never names a task.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Unique identifier for runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A recurring task as supplied by the task directory.
///
/// `offset` and `latest_completed` keep their textual form: the directory
/// may hand over values that do not parse, and those read as "no offset"
/// and "never completed" respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Cron expression (5, 6 or 7 fields, a `@daily`-style alias, or `@every <duration>`).
    pub cron: String,
    /// Duration literal such as `"5m"` added to every scheduled instant.
    #[serde(default)]
    pub offset: Option<String>,
    /// RFC 3339 scheduled-for instant of the most recently finished run.
    #[serde(default)]
    pub latest_completed: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, cron: impl Into<String>) -> Self {
        Self {
            id,
            cron: cron.into(),
            offset: None,
            latest_completed: None,
        }
    }

    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    pub fn with_latest_completed(mut self, latest_completed: impl Into<String>) -> Self {
        self.latest_completed = Some(latest_completed.into());
        self
    }

    /// The parsed watermark. Absent or unparsable values read as `None`.
    pub fn latest_completed_at(&self) -> Option<DateTime<Utc>> {
        self.latest_completed.as_deref().and_then(parse_timestamp)
    }
}

/// Parse an RFC 3339 timestamp into UTC, returning `None` when malformed.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render an instant in the boundary representation (RFC 3339, UTC, sub-second digits only when present).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
