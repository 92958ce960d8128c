//! # Runtime events emitted by restarters, task controllers and the scheduler.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Restart events**: one app's restart episode (armed, waiting, relaunched, exhausted)
//! - **Task events**: distributed task lifecycle on the master (started, completed, failed, killed)
//! - **Worker events**: worker-side lifecycle on an agent
//! - **Runtime events**: scheduler shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as the app identity,
//! task id, controller token, reasons and delays.
//!
//! ## Ordering guarantees
//! Each event published through one [`Bus`](crate::events::Bus) gets a sequence
//! number (`seq`) that increases monotonically per bus.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use fleetvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::AppRestartScheduled)
//!     .with_app("m1.a")
//!     .with_delay(Duration::from_millis(1500))
//!     .with_remaining(2);
//!
//! assert_eq!(ev.kind, EventKind::AppRestartScheduled);
//! assert_eq!(ev.app.as_deref(), Some("m1.a"));
//! assert_eq!(ev.delay_ms, Some(1500));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::protocol::ControllerToken;

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Restart episode events ===
    /// Restarter (re)armed and entering `Init`.
    ///
    /// Sets: `app`, `remaining`
    AppRestartArmed,

    /// Restarter deactivated on reset because no tries remain.
    ///
    /// Sets: `app`
    AppRestartSkipped,

    /// App still running; restarter waits for it to die.
    ///
    /// Sets: `app`
    AppWaitingForDeath,

    /// Relaunch scheduled after `delay_ms`.
    ///
    /// Sets: `app`, `delay_ms`, `remaining`
    AppRestartScheduled,

    /// App relaunched.
    ///
    /// Sets: `app`, `remaining` (after the decrement)
    AppRelaunched,

    /// The launcher reported a failure; the episode still ends.
    ///
    /// Sets: `app`, `reason`
    AppLaunchFailed,

    /// Restart decision reached with zero tries left; nothing launched.
    ///
    /// Sets: `app`
    AppRestartExhausted,

    // === Task events (master side) ===
    /// Controller script created and initialized.
    ///
    /// Sets: `task`, `controller`
    TaskStarted,

    /// Script reported completion; it has been disposed.
    ///
    /// Sets: `task`, `controller`
    TaskCompleted,

    /// Script raised an error; the scheduler tore the task down.
    ///
    /// Sets: `task`, `controller`, `reason`
    TaskFailed,

    /// Task killed; kill broadcast sent to all agents.
    ///
    /// Sets: `task`, `controller`
    TaskKilled,

    // === Worker events (agent side) ===
    /// Worker script started on this agent.
    ///
    /// Sets: `task` (script name), `controller`, `agent`
    WorkerStarted,

    /// Worker script finished and was dropped.
    ///
    /// Sets: `task` (script name), `controller`, `agent`
    WorkerStopped,

    /// Worker script failed; failure reported to the controller.
    ///
    /// Sets: `task` (script name), `controller`, `agent`, `reason`
    WorkerFailed,

    /// Kill broadcast disposed this agent's workers for the token; `reason` carries the count.
    /// Kills for unknown tokens publish nothing.
    ///
    /// Sets: `controller`, `agent`, `reason`
    WorkersKilled,

    // === Runtime events ===
    /// Scheduler loop asked to stop.
    ShutdownRequested,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason`
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: per-bus monotonic sequence (0 until published)
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: EventKind,

    /// App identity in `machine.app` form.
    pub app: Option<Arc<str>>,
    /// Task definition id.
    pub task: Option<Arc<str>>,
    /// Controller token scoping the task.
    pub controller: Option<ControllerToken>,
    /// Agent (machine) name.
    pub agent: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Restart delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Raw `restarts_remaining` value.
    pub remaining: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind stamped with the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            app: None,
            task: None,
            controller: None,
            agent: None,
            reason: None,
            delay_ms: None,
            remaining: None,
        }
    }

    #[inline]
    pub fn with_app(mut self, app: impl ToString) -> Self {
        self.app = Some(Arc::from(app.to_string()));
        self
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_controller(mut self, token: ControllerToken) -> Self {
        self.controller = Some(token);
        self
    }

    #[inline]
    pub fn with_agent(mut self, agent: impl Into<Arc<str>>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_remaining(mut self, raw: i32) -> Self {
        self.remaining = Some(raw);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
