//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into one structured `tracing` record.
//! Routine transitions log at `debug`, relaunches and task lifecycle at `info`,
//! failures at `warn`/`error`.
//!
//! ## Example output (fmt layer, compact)
//! ```text
//! INFO fleetvisor: app relaunched app="m1.a" remaining=2
//! WARN fleetvisor: task failed task="deploy" controller=6f1c… reason="script failed: boom"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let app = e.app.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");
        let agent = e.agent.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let controller = e.controller.map(|c| c.to_string()).unwrap_or_default();

        match e.kind {
            EventKind::AppRestartArmed => {
                debug!(seq = e.seq, app, remaining = ?e.remaining, "restart armed");
            }
            EventKind::AppRestartSkipped => {
                info!(seq = e.seq, app, "restart skipped, no tries left");
            }
            EventKind::AppWaitingForDeath => {
                debug!(seq = e.seq, app, "waiting for app to die");
            }
            EventKind::AppRestartScheduled => {
                debug!(seq = e.seq, app, delay_ms = ?e.delay_ms, remaining = ?e.remaining, "restart scheduled");
            }
            EventKind::AppRelaunched => {
                info!(seq = e.seq, app, remaining = ?e.remaining, "app relaunched");
            }
            EventKind::AppLaunchFailed => {
                warn!(seq = e.seq, app, reason, "app relaunch failed");
            }
            EventKind::AppRestartExhausted => {
                warn!(seq = e.seq, app, "restart budget exhausted");
            }
            EventKind::TaskStarted => {
                info!(seq = e.seq, task, %controller, "task started");
            }
            EventKind::TaskCompleted => {
                info!(seq = e.seq, task, %controller, "task completed");
            }
            EventKind::TaskFailed => {
                warn!(seq = e.seq, task, %controller, reason, "task failed");
            }
            EventKind::TaskKilled => {
                info!(seq = e.seq, task, %controller, "task killed");
            }
            EventKind::WorkerStarted => {
                debug!(seq = e.seq, task, %controller, agent, "worker started");
            }
            EventKind::WorkerStopped => {
                debug!(seq = e.seq, %controller, agent, "worker stopped");
            }
            EventKind::WorkerFailed => {
                warn!(seq = e.seq, %controller, agent, reason, "worker failed");
            }
            EventKind::WorkersKilled => {
                debug!(seq = e.seq, %controller, agent, reason, "workers killed");
            }
            EventKind::ShutdownRequested => {
                info!(seq = e.seq, "shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                warn!(seq = e.seq, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(seq = e.seq, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
