//! Run scheduling core
//!
//! [`TaskControl`] decides when a task's next run is due, creates runs
//! (manual backfills first, then scheduled slots), and tracks each run from
//! creation to finish. [`ScheduleDriver`] drives it from a tokio tick loop.

pub mod control;
pub mod driver;
pub mod ids;
pub mod lifecycle;
pub mod manual_queue;
pub mod poller;
pub mod registry;
pub mod run_store;
pub mod run_types;
pub mod schedule;

pub use control::TaskControl;
pub use driver::ScheduleDriver;
pub use ids::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use poller::PollTimeout;
pub use run_types::{LogEntry, ManualRun, QueuedRun, Run, RunCreation, RunStatus};
pub use schedule::{
    next_due, parse_offset, watermark, CronScheduleParser, DueSlot, Schedule, ScheduleParser,
    TaskSchedule,
};
