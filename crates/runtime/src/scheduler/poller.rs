//! Bounded polling on the created-run registry, for tests and diagnostics.

use std::thread;

use thiserror::Error;

use super::control::TaskControl;
use super::run_types::QueuedRun;
use crate::config::PollerConfig;
use crate::types::TaskId;

/// The registry never held exactly the expected number of runs within the budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("did not see count of {expected} created run(s) for task with ID {task_id} in time, instead saw {actual}")]
pub struct PollTimeout {
    pub task_id: TaskId,
    pub expected: usize,
    pub actual: usize,
    /// Registry contents observed on the last attempt.
    pub observed: Vec<QueuedRun>,
}

impl TaskControl {
    /// Wait until exactly `count` created runs are registered for `task_id`,
    /// using the default budget of 50 attempts spaced 2ms apart.
    ///
    /// Blocks the calling thread. From async code use
    /// [`poll_for_number_created_async`](Self::poll_for_number_created_async).
    pub fn poll_for_number_created(
        &self,
        task_id: TaskId,
        count: usize,
    ) -> Result<Vec<QueuedRun>, PollTimeout> {
        self.poll_for_number_created_with(&PollerConfig::default(), task_id, count)
    }

    /// Poll with an explicit budget. The registry is sampled at least once,
    /// even when `config.attempts` is zero.
    pub fn poll_for_number_created_with(
        &self,
        config: &PollerConfig,
        task_id: TaskId,
        count: usize,
    ) -> Result<Vec<QueuedRun>, PollTimeout> {
        let mut observed = Vec::new();
        for _ in 0..config.attempts.max(1) {
            thread::sleep(config.delay);
            observed = self.created_for(task_id);
            if observed.len() == count {
                return Ok(observed);
            }
        }
        Err(timeout(task_id, count, observed))
    }

    /// Same contract as [`poll_for_number_created_with`](Self::poll_for_number_created_with),
    /// sleeping on the tokio timer instead of the thread.
    pub async fn poll_for_number_created_async(
        &self,
        config: &PollerConfig,
        task_id: TaskId,
        count: usize,
    ) -> Result<Vec<QueuedRun>, PollTimeout> {
        let mut observed = Vec::new();
        for _ in 0..config.attempts.max(1) {
            tokio::time::sleep(config.delay).await;
            observed = self.created_for(task_id);
            if observed.len() == count {
                return Ok(observed);
            }
        }
        Err(timeout(task_id, count, observed))
    }
}

fn timeout(task_id: TaskId, expected: usize, observed: Vec<QueuedRun>) -> PollTimeout {
    let err = PollTimeout {
        task_id,
        expected,
        actual: observed.len(),
        observed,
    };
    tracing::warn!(error = %err, "poll for created runs timed out");
    err
}
