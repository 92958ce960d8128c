//! # Scheduler: the single-threaded tick loop.
//!
//! Owns the app registry, one [`AppRestarter`] per restarting app and one
//! [`DTaskController`] per live task, and ticks all of them once per cycle.
//!
//! ## Architecture
//! ```text
//!   run(token) ── interval(tick_period) ──► tick()
//!                                            ├─► AppRestarter::tick()     (finished ones dropped)
//!                                            └─► DTaskController::tick()  (error boundary)
//!
//!   AppRestarter / DTaskController ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Rules
//! - `tick` never blocks and never fails; a script error tears its task down as
//!   if it had completed (logged, `TaskFailed` published, no kill broadcast).
//! - Tasks leave the table once their script is gone (completed, failed or killed).
//! - On exit from `run` every remaining task is killed and every restarter dropped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::{AppDef, AppId, AppLauncher, AppRegistry, AppRestarter, AppStateHandle, RestarterParams};
use crate::controller::{DTaskController, DTaskDef};
use crate::core::{Master, SchedulerConfig, shutdown};
use crate::error::SchedulerError;
use crate::events::{Event, EventKind};
use crate::protocol::{ControllerToken, MessageBus};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::ScriptFactory;

/// Drives restarters and task controllers.
pub struct Scheduler {
    config: SchedulerConfig,
    master: Master,
    launcher: Arc<dyn AppLauncher>,
    apps: AppRegistry,
    restarters: HashMap<AppId, AppRestarter>,
    tasks: HashMap<ControllerToken, DTaskController>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Scheduler {
    /// Validates `config` and builds the shared services.
    pub fn new(
        config: SchedulerConfig,
        factory: Arc<dyn ScriptFactory>,
        launcher: Arc<dyn AppLauncher>,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let capacity = config.bus_capacity_clamped();
        let master = Master::new(factory)
            .with_wire(MessageBus::new(capacity))
            .with_bus(crate::events::Bus::new(capacity));

        Ok(Self {
            config,
            master,
            launcher,
            apps: AppRegistry::new(),
            restarters: HashMap::new(),
            tasks: HashMap::new(),
            subscribers: Vec::new(),
        })
    }

    /// Subscribers fed from the event bus while [`run`](Self::run) is active.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn master(&self) -> &Master {
        &self.master
    }

    pub fn apps(&self) -> &AppRegistry {
        &self.apps
    }

    /// Registers (or redefines) an app; returns its live state handle.
    pub fn register_app(&mut self, def: AppDef) -> AppStateHandle {
        self.apps.register(def)
    }

    /// Forgets an app, dropping its restarter if any.
    pub fn remove_app(&mut self, id: &AppId) -> bool {
        self.cancel_restart(id);
        self.apps.remove_app(id)
    }

    /// Starts a restart episode for `id`, or re-arms the one in progress.
    pub fn restart_app(&mut self, id: &AppId, wait_before_restart: bool) -> Result<(), SchedulerError> {
        if let Some(restarter) = self.restarters.get_mut(id) {
            restarter.reset(wait_before_restart);
            return Ok(());
        }

        let (Some(def), Some(state)) = (self.apps.def(id), self.apps.state(id)) else {
            return Err(SchedulerError::UnknownApp { app: id.to_string() });
        };
        let params = RestarterParams::new(wait_before_restart)
            .with_default_policy(self.config.default_restart)
            .with_bus(self.master.bus().clone());
        let restarter = AppRestarter::new(def, state, Arc::clone(&self.launcher), params)?;

        debug!(app = %id, wait_before_restart, "restart requested");
        self.restarters.insert(id.clone(), restarter);
        Ok(())
    }

    /// Abandons the restart episode of `id`; clears its `restarting` flag.
    pub fn cancel_restart(&mut self, id: &AppId) -> bool {
        self.restarters.remove(id).is_some()
    }

    pub fn is_restarting(&self, id: &AppId) -> bool {
        self.restarters.contains_key(id)
    }

    /// Human-readable status of an app, see [`AppState::status_code`](crate::AppState::status_code).
    pub fn app_status(&self, id: &AppId, is_remote: bool) -> Option<String> {
        let state = self.apps.state(id)?;
        let offline_after = self.config.offline_after();
        Some(state.read(|st| st.status_code(Utc::now(), is_remote, offline_after)))
    }

    /// Starts a new task instance under a fresh controller.
    pub fn start_task(&mut self, def: &DTaskDef, args: Option<&str>) -> Result<ControllerToken, SchedulerError> {
        let mut controller = DTaskController::new(self.master.clone());
        controller.start(def, args)?;
        let token = controller.token();
        self.tasks.insert(token, controller);
        Ok(token)
    }

    /// Kills the task and broadcasts the worker cleanup. Unknown tokens are a no-op.
    pub fn kill_task(&mut self, token: ControllerToken) -> bool {
        match self.tasks.remove(&token) {
            Some(mut controller) => controller.kill(),
            None => false,
        }
    }

    pub fn task_status(&self, token: ControllerToken) -> Option<&str> {
        self.tasks.get(&token).map(DTaskController::status_text)
    }

    pub fn task_tokens(&self) -> impl Iterator<Item = ControllerToken> + '_ {
        self.tasks.keys().copied()
    }

    /// One scheduling cycle.
    pub fn tick(&mut self) {
        for restarter in self.restarters.values_mut() {
            restarter.tick();
        }
        self.restarters.retain(|_, r| !r.shall_be_removed());

        let bus = self.master.bus();
        self.tasks.retain(|token, controller| match controller.tick() {
            Ok(()) => controller.is_running(),
            Err(e) => {
                warn!(task = controller.id(), controller = %token, error = %e, "task script failed");
                bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task(controller.id())
                        .with_controller(*token)
                        .with_reason(e.to_string()),
                );
                controller.remove_script();
                false
            }
        });
    }

    /// Kills every task and drops every restarter.
    pub fn shutdown(&mut self) {
        for (_, mut controller) in self.tasks.drain() {
            controller.kill();
        }
        self.restarters.clear();
    }

    /// Ticks on the configured period until `token` is cancelled, then shuts down.
    pub async fn run(&mut self, token: CancellationToken) {
        let listener = self.subscriber_listener();

        let mut interval = tokio::time::interval(self.config.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => self.tick(),
            }
        }

        self.master.bus().publish(Event::new(EventKind::ShutdownRequested));
        self.shutdown();

        if let Some((stop, handle)) = listener {
            stop.cancel();
            let _ = handle.await;
        }
    }

    /// [`run`](Self::run) until the process receives a termination signal.
    pub async fn run_until_signal(&mut self) {
        let token = CancellationToken::new();
        let watcher = shutdown::cancel_on_signal(token.clone());
        self.run(token).await;
        watcher.abort();
    }

    /// Forwards bus events to the subscriber set until stopped, draining what is queued.
    fn subscriber_listener(&mut self) -> Option<(CancellationToken, tokio::task::JoinHandle<()>)> {
        if self.subscribers.is_empty() {
            return None;
        }
        let subs = std::mem::take(&mut self.subscribers);
        let set = SubscriberSet::new(subs, self.master.bus().clone());
        let mut rx = self.master.bus().subscribe();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => warn!(skipped, "event listener lagged"),
                        Err(RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => break,
                }
            }
            set.shutdown().await;
        });
        Some((stop, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppState, RestartsRemaining};
    use crate::error::LaunchError;
    use crate::protocol::{Message, WorkerHost};
    use crate::tasks::ScriptRegistry;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Launcher that marks the app running again, like a real process watcher would.
    struct Relauncher {
        states: Mutex<HashMap<AppId, AppStateHandle>>,
        launches: Mutex<Vec<AppId>>,
    }

    impl Relauncher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(HashMap::new()),
                launches: Mutex::new(Vec::new()),
            })
        }

        fn track(&self, id: &AppId, state: AppStateHandle) {
            self.states.lock().unwrap().insert(id.clone(), state);
        }

        fn count(&self) -> usize {
            self.launches.lock().unwrap().len()
        }
    }

    impl AppLauncher for Relauncher {
        fn launch_app(&self, id: &AppId, reset: bool) -> Result<(), LaunchError> {
            assert!(!reset);
            let states = self.states.lock().unwrap();
            let state = states.get(id).ok_or_else(|| LaunchError::UnknownApp {
                app: id.to_string(),
            })?;
            state.update(|st| {
                st.set_started(true);
                st.set_running(true);
            });
            self.launches.lock().unwrap().push(id.clone());
            Ok(())
        }
    }

    fn scheduler(launcher: Arc<Relauncher>) -> Scheduler {
        let config = SchedulerConfig {
            tick_period_ms: 10,
            ..SchedulerConfig::default()
        };
        Scheduler::new(config, Arc::new(ScriptRegistry::with_builtins()), launcher).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_app_is_relaunched_and_restarter_dropped() {
        let launcher = Relauncher::new();
        let mut sched = scheduler(launcher.clone());
        let id = AppId::new("m1", "web");
        let state = sched.register_app(AppDef::new(id.clone()).with_restarter("delay = 0.05\nmaxTries = 2"));
        launcher.track(&id, state.clone());
        state.update(|st| {
            st.set_started(true);
            st.set_running(false);
        });

        sched.restart_app(&id, true).unwrap();
        assert!(sched.is_restarting(&id));
        sched.tick();
        assert_eq!(sched.app_status(&id, false).as_deref(), Some("Restarting (2 remaining)"));

        for _ in 0..3 {
            sched.tick();
        }
        tokio::time::advance(Duration::from_millis(60)).await;
        sched.tick();
        sched.tick();

        assert_eq!(launcher.count(), 1);
        assert!(!sched.is_restarting(&id));
        assert_eq!(state.read(AppState::restarts_remaining), RestartsRemaining::count(1));
        assert_eq!(sched.app_status(&id, false).as_deref(), Some("Initializing"));
    }

    #[test]
    fn restart_of_unknown_app_fails() {
        let mut sched = scheduler(Relauncher::new());
        let err = sched.restart_app(&AppId::new("m1", "ghost"), false).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_unknown_app");
    }

    #[test]
    fn malformed_restart_block_is_reported() {
        let mut sched = scheduler(Relauncher::new());
        let id = AppId::new("m1", "bad");
        sched.register_app(AppDef::new(id.clone()).with_restarter("maxTries = \"lots\""));
        let err = sched.restart_app(&id, false).unwrap_err();
        assert_eq!(err.as_label(), "config_malformed");
        assert!(!sched.is_restarting(&id));
    }

    #[test]
    fn cancel_restart_clears_flag() {
        let mut sched = scheduler(Relauncher::new());
        let id = AppId::new("m1", "a");
        let state = sched.register_app(AppDef::new(id.clone()));
        state.update(|st| st.set_running(true));
        sched.restart_app(&id, false).unwrap();
        sched.tick();
        assert!(state.read(AppState::restarting));

        assert!(sched.cancel_restart(&id));
        assert!(!state.read(AppState::restarting));
        assert!(!sched.cancel_restart(&id));
    }

    #[tokio::test]
    async fn gather_task_completes_with_a_worker_host() {
        let mut sched = scheduler(Relauncher::new());
        let mut host = WorkerHost::new("a1", sched.master().clone());
        let def = DTaskDef::new("collect", "gather");

        let token = sched.start_task(&def, Some("a1")).unwrap();
        assert!(sched.task_status(token).is_some());

        for _ in 0..50 {
            tokio::task::yield_now().await;
            host.tick();
            tokio::task::yield_now().await;
            sched.tick();
            if sched.task_status(token).is_none() {
                break;
            }
        }
        assert!(sched.task_status(token).is_none());
        tokio::task::yield_now().await;
        host.tick();
        assert_eq!(host.worker_count(), 0);
    }

    #[tokio::test]
    async fn failing_task_is_torn_down_without_kill() {
        let mut sched = scheduler(Relauncher::new());
        let mut events = sched.master().bus().subscribe();
        let mut wire = sched.master().wire().subscribe();
        let def = DTaskDef::new("collect", "gather").with_var("timeout_ms", "1");

        let token = sched.start_task(&def, Some("nobody")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        sched.tick();
        assert!(sched.task_status(token).is_none());

        let failed = std::iter::from_fn(|| events.try_recv().ok())
            .find(|e| e.kind == EventKind::TaskFailed)
            .expect("task failed event");
        assert_eq!(failed.controller, Some(token));
        assert!(
            std::iter::from_fn(|| wire.try_recv().ok())
                .all(|m| !matches!(m, Message::KillTaskWorkers { .. }))
        );
    }

    #[tokio::test]
    async fn kill_task_broadcasts_and_forgets() {
        let mut sched = scheduler(Relauncher::new());
        let mut wire = sched.master().wire().subscribe();
        let token = sched.start_task(&DTaskDef::new("collect", "gather"), Some("a9")).unwrap();

        assert!(sched.kill_task(token));
        assert!(!sched.kill_task(token));
        let kills = std::iter::from_fn(|| wire.try_recv().ok())
            .filter(|m| matches!(m, Message::KillTaskWorkers { controller, .. } if *controller == token))
            .count();
        assert_eq!(kills, 1);
    }

    struct Counter(Mutex<Vec<EventKind>>);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel_and_kills_tasks() {
        let counter = Arc::new(Counter(Mutex::new(Vec::new())));
        let subs: Vec<Arc<dyn Subscribe>> = vec![counter.clone()];
        let mut sched = scheduler(Relauncher::new()).with_subscribers(subs);
        let mut wire = sched.master().wire().subscribe();
        let token = sched.start_task(&DTaskDef::new("collect", "gather"), Some("a9")).unwrap();

        let stop = CancellationToken::new();
        let trigger = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            trigger.cancel();
        });
        sched.run(stop).await;

        assert!(sched.task_status(token).is_none());
        assert!(
            std::iter::from_fn(|| wire.try_recv().ok())
                .any(|m| matches!(m, Message::KillTaskWorkers { controller, .. } if controller == token))
        );
        let seen = counter.0.lock().unwrap().clone();
        assert!(seen.contains(&EventKind::ShutdownRequested));
        assert!(seen.contains(&EventKind::TaskKilled));
    }
}
