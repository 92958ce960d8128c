//! # AppRestarter: one restart episode of one app.
//!
//! Waits until the app dies, waits the configured delay, relaunches it once
//! (budget permitting) and then deactivates itself for good. The next episode
//! gets a fresh restarter, or this one is re-armed with [`AppRestarter::reset`].
//!
//! ## Phases
//! ```text
//!            reset()                       restarts_remaining == 0
//!   ┌──────────────────────┐      ┌────────────────────────────────────────┐
//!   ▼                      │      │                                        ▼
//! Init ──running──► WaitingForDeath ──died──► WaitBeforeRestart ──► WaitingBeforeRestart
//!   │                                           ▲                        │ elapsed > delay
//!   ├──!running && wait_before_restart──────────┘                        ▼
//!   └──!running && !wait_before_restart────────────────────────────► Restart ──► Disabled
//! ```
//!
//! ## Rules
//! - Each [`tick`](AppRestarter::tick) performs at most one transition and never blocks.
//! - Waiting is measured against a stored start instant ([`tokio::time::Instant`]).
//! - `Restart`: `-1` launches, `> 0` decrements then launches, `0` launches nothing.
//!   The episode ends the same way whatever the launcher returns.
//! - Dropping the restarter clears `restarting` on the app, from any phase.
//! - Not reentrant: tick from one logical thread, replace only between ticks.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use crate::app::{AppDef, AppId, AppLauncher, AppState, AppStateHandle, RestartsRemaining};
use crate::error::ConfigError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::RestartPolicy;

/// Phase of a restart episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestarterPhase {
    /// Marks the app as restarting, then branches on whether it still runs.
    Init,
    /// App still running; waiting for it to terminate.
    WaitingForDeath,
    /// One-tick step that stamps the start of the pre-restart wait.
    WaitBeforeRestart,
    /// Waiting for the restart delay to elapse.
    WaitingBeforeRestart,
    /// Relaunch decision.
    Restart,
    /// Terminal; ticks are no-ops.
    Disabled,
}

/// Construction parameters of an [`AppRestarter`].
#[derive(Clone, Debug)]
pub struct RestarterParams {
    /// Wait the restart delay even when the app is already dead at `Init`.
    pub wait_before_restart: bool,
    /// Policy used when the app definition has no inline restart block.
    pub default_policy: RestartPolicy,
    /// Bus receiving restart events.
    pub bus: Bus,
}

impl RestarterParams {
    pub fn new(wait_before_restart: bool) -> Self {
        Self {
            wait_before_restart,
            default_policy: RestartPolicy::default(),
            bus: Bus::default(),
        }
    }

    pub fn with_default_policy(mut self, policy: RestartPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }
}

/// Per-app restart automaton.
pub struct AppRestarter {
    id: AppId,
    policy: RestartPolicy,
    state: AppStateHandle,
    launcher: Arc<dyn AppLauncher>,
    bus: Bus,
    phase: RestarterPhase,
    wait_before_restart: bool,
    waiting_since: Instant,
    shall_be_removed: bool,
}

impl AppRestarter {
    /// Parses the app's restart block and arms the automaton.
    ///
    /// A malformed block fails the construction; the app state is not touched
    /// in that case.
    pub fn new(
        def: &AppDef,
        state: AppStateHandle,
        launcher: Arc<dyn AppLauncher>,
        params: RestarterParams,
    ) -> Result<Self, ConfigError> {
        let policy =
            RestartPolicy::from_optional_block(def.restarter.as_deref(), params.default_policy)?;

        let mut restarter = Self {
            id: def.id.clone(),
            policy,
            state,
            launcher,
            bus: params.bus,
            phase: RestarterPhase::Init,
            wait_before_restart: params.wait_before_restart,
            waiting_since: Instant::now(),
            shall_be_removed: false,
        };
        restarter.reset(params.wait_before_restart);
        Ok(restarter)
    }

    /// Re-arms the automaton for a new episode.
    ///
    /// Seeds `restarts_remaining` from `max_tries` if it is still uninitialized;
    /// with nothing left the automaton goes straight to `Disabled`.
    pub fn reset(&mut self, wait_before_restart: bool) {
        self.wait_before_restart = wait_before_restart;

        let max_tries = self.policy.max_tries;
        let remaining = self.state.update(|st| {
            if st.restarts_remaining().is_uninitialized() {
                st.set_restarts_remaining(max_tries);
            }
            st.restarts_remaining()
        });

        if remaining.is_exhausted() {
            self.shall_be_removed = true;
            self.phase = RestarterPhase::Disabled;
            self.publish(EventKind::AppRestartSkipped);
        } else {
            self.shall_be_removed = false;
            self.phase = RestarterPhase::Init;
            self.bus.publish(
                Event::new(EventKind::AppRestartArmed)
                    .with_app(&self.id)
                    .with_remaining(remaining.raw()),
            );
        }
    }

    /// Advances the automaton by at most one transition.
    pub fn tick(&mut self) {
        match self.phase {
            RestarterPhase::Init => {
                let running = self.state.update(|st| {
                    st.set_restarting(true);
                    st.running()
                });

                self.phase = if running {
                    debug!(app = %self.id, "waiting for app to die");
                    self.publish(EventKind::AppWaitingForDeath);
                    RestarterPhase::WaitingForDeath
                } else if self.wait_before_restart {
                    RestarterPhase::WaitBeforeRestart
                } else {
                    RestarterPhase::Restart
                };
            }

            RestarterPhase::WaitingForDeath => {
                if !self.state.read(AppState::running) {
                    self.waiting_since = Instant::now();
                    self.phase = RestarterPhase::WaitBeforeRestart;
                }
            }

            RestarterPhase::WaitBeforeRestart => {
                debug!(app = %self.id, delay = ?self.policy.delay, "waiting before restart");
                self.waiting_since = Instant::now();
                self.phase = RestarterPhase::WaitingBeforeRestart;
                let remaining = self.state.read(AppState::restarts_remaining);
                self.bus.publish(
                    Event::new(EventKind::AppRestartScheduled)
                        .with_app(&self.id)
                        .with_delay(self.policy.delay)
                        .with_remaining(remaining.raw()),
                );
            }

            RestarterPhase::WaitingBeforeRestart => {
                if self.waiting_since.elapsed() > self.policy.delay {
                    self.phase = RestarterPhase::Restart;
                }
            }

            RestarterPhase::Restart => self.restart(),

            RestarterPhase::Disabled => {}
        }
    }

    fn restart(&mut self) {
        let (launch, remaining) = self.state.update(|st| {
            let remaining = st.restarts_remaining();
            if remaining.is_unlimited() {
                return (true, remaining);
            }
            match remaining.remaining() {
                Some(n) if n > 0 => {
                    let left = RestartsRemaining::count(n - 1);
                    st.set_restarts_remaining(left);
                    (true, left)
                }
                _ => (false, remaining),
            }
        });

        // The launcher may write the same app state, so the lock is released first.
        if launch {
            match self.launcher.launch_app(&self.id, false) {
                Ok(()) => {
                    debug!(app = %self.id, %remaining, "app relaunched");
                    self.bus.publish(
                        Event::new(EventKind::AppRelaunched)
                            .with_app(&self.id)
                            .with_remaining(remaining.raw()),
                    );
                }
                Err(e) => {
                    self.bus.publish(
                        Event::new(EventKind::AppLaunchFailed)
                            .with_app(&self.id)
                            .with_reason(e.to_string()),
                    );
                }
            }
        } else {
            self.publish(EventKind::AppRestartExhausted);
        }

        self.state.update(|st| st.set_restarting(false));
        self.shall_be_removed = true;
        self.phase = RestarterPhase::Disabled;
    }

    /// Explicit disposal; equivalent to dropping the restarter.
    pub fn dispose(self) {
        drop(self);
    }

    /// Done restarting; the owner may drop the automaton.
    pub fn shall_be_removed(&self) -> bool {
        self.shall_be_removed
    }

    pub fn phase(&self) -> RestarterPhase {
        self.phase
    }

    pub fn app_id(&self) -> &AppId {
        &self.id
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn wait_before_restart(&self) -> bool {
        self.wait_before_restart
    }

    fn publish(&self, kind: EventKind) {
        self.bus.publish(Event::new(kind).with_app(&self.id));
    }
}

impl Drop for AppRestarter {
    fn drop(&mut self) {
        self.state.update(|st| st.set_restarting(false));
    }
}
