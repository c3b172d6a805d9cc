//! Cadence run scheduling core
//!
//! Computes when a cron-scheduled task is next due, creates runs for due
//! slots and queued manual backfills, and tracks every run through its
//! lifecycle until it finishes and advances the task's completion watermark.
//!
//! ```no_run
//! use cadence_runtime::{Task, TaskControl, TaskId};
//!
//! let control = TaskControl::with_defaults();
//! let task = Task::new(TaskId::new(), "*/5 * * * *");
//! let task_id = task.id;
//! control.set_task(task);
//!
//! match control.create_next_run(task_id, chrono::Utc::now()) {
//!     Ok(creation) => println!("created {}", creation.created.run_id),
//!     Err(e) if e.is_not_yet_due() => println!("next due at {:?}", e.due_at()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod config;
pub mod logging;
pub mod scheduler;
pub mod types;

pub use config::{ConfigError, ControlConfig, DriverConfig, LogFormat, LoggingConfig, PollerConfig};
pub use scheduler::{
    CronScheduleParser, IdGenerator, LogEntry, ManualRun, PollTimeout, QueuedRun, Run,
    RunCreation, RunStatus, Schedule, ScheduleDriver, ScheduleParser, SequentialIdGenerator,
    TaskControl, UuidGenerator,
};
pub use types::*;
