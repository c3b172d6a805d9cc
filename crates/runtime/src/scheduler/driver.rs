//! Background tick loop that turns due slots into runs.
//!
//! The driver owns no scheduling state of its own beyond a per-task wake-up
//! time; every decision goes through [`TaskControl::create_next_run`]. Created
//! runs are handed to executors over an mpsc channel.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::futures::Notified;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::control::TaskControl;
use super::run_types::QueuedRun;
use crate::config::DriverConfig;
use crate::types::{ControlError, TaskId};

pub struct ScheduleDriver {
    control: Arc<TaskControl>,
    config: DriverConfig,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<RwLock<bool>>,
}

/// Why a task's drain stopped.
enum Drained {
    /// Nothing more to do for this task before the given instant.
    Until(DateTime<Utc>),
    /// The receiver is gone or shutdown was requested.
    Stop,
}

impl ScheduleDriver {
    pub fn new(control: Arc<TaskControl>, config: DriverConfig) -> Self {
        Self {
            control,
            config,
            shutdown_notify: Arc::new(Notify::new()),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Spawn the tick loop. Every created run is sent on `runs_tx`; the loop
    /// stops on [`shutdown`](Self::shutdown) or when the receiver is dropped.
    pub fn start(&self, runs_tx: mpsc::Sender<QueuedRun>) -> JoinHandle<()> {
        *self.is_running.write() = true;

        let control = self.control.clone();
        let shutdown = self.shutdown_notify.clone();
        let is_running = self.is_running.clone();
        let idle = self.config.idle_interval;

        tokio::spawn(async move {
            tracing::info!(idle_interval = ?idle, "schedule driver started");
            tick_loop(control, runs_tx, shutdown, is_running.clone(), idle).await;
            *is_running.write() = false;
            tracing::info!("schedule driver stopped");
        })
    }

    /// Stop the tick loop. Safe to call more than once.
    pub fn shutdown(&self) {
        {
            let is_running = self.is_running.read();
            if !*is_running {
                return;
            }
        }
        *self.is_running.write() = false;
        self.shutdown_notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }
}

async fn tick_loop(
    control: Arc<TaskControl>,
    runs_tx: mpsc::Sender<QueuedRun>,
    shutdown: Arc<Notify>,
    is_running: Arc<RwLock<bool>>,
    idle: Duration,
) {
    let idle_span = chrono::Duration::from_std(idle).unwrap_or_else(|_| chrono::Duration::seconds(1));
    let mut next_tick: HashMap<TaskId, DateTime<Utc>> = HashMap::new();

    loop {
        // Registered before the flag check so a shutdown in between is not missed.
        let notified = shutdown.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !*is_running.read() {
            break;
        }

        let now = Utc::now();
        let mut wake = deadline_after(now, idle_span);
        for task_id in control.task_ids() {
            let waiting = next_tick.get(&task_id).copied().filter(|at| *at > now);
            if let Some(at) = waiting.filter(|_| !backlog_pending(&control, task_id)) {
                wake = wake.min(at);
                continue;
            }
            match drain_task(&control, task_id, &runs_tx, notified.as_mut(), idle_span).await {
                Drained::Until(at) => {
                    next_tick.insert(task_id, at);
                    wake = wake.min(at);
                }
                Drained::Stop => return,
            }
        }

        let pause = (wake - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = notified => break,
        }
    }
}

/// Create runs for one task until it has nothing due and the manual
/// backlog is empty.
async fn drain_task(
    control: &TaskControl,
    task_id: TaskId,
    runs_tx: &mpsc::Sender<QueuedRun>,
    mut shutdown: Pin<&mut Notified<'_>>,
    idle_span: chrono::Duration,
) -> Drained {
    loop {
        let creation = match control.create_next_run(task_id, Utc::now()) {
            Ok(creation) => creation,
            // A malformed manual entry was dropped ahead of valid ones.
            Err(ControlError::RunNotYetDue { .. }) if backlog_pending(control, task_id) => continue,
            Err(ControlError::RunNotYetDue { due_at }) => return Drained::Until(due_at),
            Err(e) => {
                tracing::error!(%task_id, error = %e, "run creation failed, retrying later");
                return Drained::Until(deadline_after(Utc::now(), idle_span));
            }
        };

        tokio::select! {
            sent = runs_tx.send(creation.created) => {
                if sent.is_err() {
                    tracing::warn!(%task_id, "run receiver dropped, stopping driver");
                    return Drained::Stop;
                }
            }
            _ = shutdown.as_mut() => return Drained::Stop,
        }

        if !creation.has_queue && !backlog_pending(control, task_id) {
            return Drained::Until(creation.next_due);
        }
    }
}

fn backlog_pending(control: &TaskControl, task_id: TaskId) -> bool {
    !control.manual_runs(task_id).is_empty()
}

/// `at + span`, saturating at the latest representable instant.
fn deadline_after(at: DateTime<Utc>, span: chrono::Duration) -> DateTime<Utc> {
    at.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
