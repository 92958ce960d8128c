//! # DTaskController: the master-side half of one distributed task.
//!
//! Owns the controller script of one task instance, ticks it, and guarantees
//! the remote cleanup broadcast when the task is killed.
//!
//! ## Lifecycle
//! ```text
//! new(master) ──► start(def, args) ──► tick() … tick() ──┬─► script done ──► dropped ("None")
//!   (token)         fresh instance id,                   ├─► kill() ──► dispose + KillTaskWorkers{token, instance}
//!                   factory.create + init                └─► Err(ScriptError) ──► owner: remove_script()
//! ```
//!
//! ## Rules
//! - The controller token is generated once and never changes; every launch
//!   gets a fresh [`TaskInstanceId`].
//! - At most one script is held. Starting while one is held is rejected.
//! - `kill` sends exactly one broadcast per held script and is a no-op otherwise.
//! - Script errors are not caught here; they propagate out of `tick`.

use tracing::debug;

use crate::controller::{DTaskDef, DTaskState, NO_SCRIPT_STATUS};
use crate::core::Master;
use crate::error::ScriptError;
use crate::events::{Event, EventKind};
use crate::protocol::{ControllerToken, Message, TaskInstanceId};
use crate::tasks::{Script, ScriptRequest, ScriptRole};

/// Master-side owner of one distributed task instance.
pub struct DTaskController {
    token: ControllerToken,
    master: Master,
    id: String,
    instance: Option<TaskInstanceId>,
    script: Option<Box<dyn Script>>,
    state: DTaskState,
}

impl DTaskController {
    pub fn new(master: Master) -> Self {
        Self {
            token: ControllerToken::generate(),
            master,
            id: String::new(),
            instance: None,
            script: None,
            state: DTaskState::default(),
        }
    }

    /// Token tagging the kill broadcast and all worker-side state.
    pub fn token(&self) -> ControllerToken {
        self.token
    }

    /// Id of the last started task definition.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Instance id of the last launch.
    pub fn instance(&self) -> Option<TaskInstanceId> {
        self.instance
    }

    pub fn state(&self) -> &DTaskState {
        &self.state
    }

    pub fn status_text(&self) -> &str {
        &self.state.status_text
    }

    /// A script is held.
    pub fn is_running(&self) -> bool {
        self.script.is_some()
    }

    /// Creates the definition's controller script through the factory and starts it.
    pub fn start(&mut self, def: &DTaskDef, args: Option<&str>) -> Result<TaskInstanceId, ScriptError> {
        self.ensure_idle()?;

        let instance = TaskInstanceId::generate();
        let req = ScriptRequest::new(self.token, instance, ScriptRole::Controller, &def.script_name)
            .with_id(&def.id)
            .with_folder(def.script_folder.clone())
            .with_args(args.map(str::to_string))
            .with_vars(def.resolved_vars());

        let script = self.master.create_script(&req)?;
        self.install(&def.id, instance, script)
    }

    /// Starts a ready-made, not yet initialized script under `id`.
    pub fn start_script(
        &mut self,
        id: impl Into<String>,
        script: Box<dyn Script>,
    ) -> Result<TaskInstanceId, ScriptError> {
        self.ensure_idle()?;
        self.install(&id.into(), TaskInstanceId::generate(), script)
    }

    fn ensure_idle(&self) -> Result<(), ScriptError> {
        if self.script.is_some() {
            return Err(ScriptError::AlreadyRunning {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn install(
        &mut self,
        id: &str,
        instance: TaskInstanceId,
        mut script: Box<dyn Script>,
    ) -> Result<TaskInstanceId, ScriptError> {
        if let Err(e) = script.init() {
            script.dispose();
            return Err(e);
        }

        debug!(task = id, controller = %self.token, %instance, "task started");
        self.id = id.to_string();
        self.instance = Some(instance);
        self.script = Some(script);
        self.refresh_status();
        self.publish(EventKind::TaskStarted);
        Ok(instance)
    }

    /// Ticks the held script and drops it once it reports completion.
    pub fn tick(&mut self) -> Result<(), ScriptError> {
        if let Some(script) = self.script.as_mut() {
            script.tick()?;
            if script.shall_be_removed() {
                self.drop_script();
                self.publish(EventKind::TaskCompleted);
            }
        }
        self.refresh_status();
        Ok(())
    }

    /// Disposes the held script and tells every agent to discard this task's workers.
    ///
    /// Returns `false` (and sends nothing) if no script was held.
    pub fn kill(&mut self) -> bool {
        let Some(task) = self.instance.filter(|_| self.script.is_some()) else {
            return false;
        };
        self.drop_script();
        self.master.wire().send(Message::KillTaskWorkers {
            controller: self.token,
            task,
        });
        self.publish(EventKind::TaskKilled);
        true
    }

    /// Disposes the held script without the kill broadcast.
    pub fn remove_script(&mut self) -> bool {
        self.drop_script()
    }

    fn drop_script(&mut self) -> bool {
        let Some(mut script) = self.script.take() else {
            return false;
        };
        script.dispose();
        self.refresh_status();
        true
    }

    fn refresh_status(&mut self) {
        self.state.status_text = match &self.script {
            Some(script) => script.status_text(),
            None => NO_SCRIPT_STATUS.to_string(),
        };
    }

    fn publish(&self, kind: EventKind) {
        self.master.bus().publish(
            Event::new(kind)
                .with_task(self.id.as_str())
                .with_controller(self.token),
        );
    }
}

impl Drop for DTaskController {
    fn drop(&mut self) {
        if let Some(mut script) = self.script.take() {
            script.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::ScriptRegistry;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tracker {
        inits: AtomicUsize,
        ticks: AtomicUsize,
        disposed: AtomicUsize,
        finish: AtomicBool,
        fail_tick: AtomicBool,
        fail_init: AtomicBool,
    }

    struct Fake(Arc<Tracker>);

    impl Script for Fake {
        fn init(&mut self) -> Result<(), ScriptError> {
            self.0.inits.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_init.load(Ordering::SeqCst) {
                return Err(ScriptError::fail("init"));
            }
            Ok(())
        }

        fn tick(&mut self) -> Result<(), ScriptError> {
            self.0.ticks.fetch_add(1, Ordering::SeqCst);
            if self.0.fail_tick.load(Ordering::SeqCst) {
                return Err(ScriptError::fail("tick"));
            }
            Ok(())
        }

        fn dispose(&mut self) {
            self.0.disposed.fetch_add(1, Ordering::SeqCst);
        }

        fn shall_be_removed(&self) -> bool {
            self.0.finish.load(Ordering::SeqCst)
        }

        fn status_text(&self) -> String {
            format!("ticks={}", self.0.ticks.load(Ordering::SeqCst))
        }
    }

    fn setup() -> (DTaskController, Arc<Tracker>, Master) {
        let tracker = Arc::new(Tracker::default());
        let mut reg = ScriptRegistry::new();
        let p = Arc::clone(&tracker);
        reg.register("fake", move |req, _| {
            assert_eq!(req.role, ScriptRole::Controller);
            Ok(Box::new(Fake(Arc::clone(&p))) as Box<dyn Script>)
        });
        let master = Master::new(Arc::new(reg));
        (DTaskController::new(master.clone()), tracker, master)
    }

    fn kills(rx: &mut tokio::sync::broadcast::Receiver<Message>) -> Vec<ControllerToken> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|m| match m {
                Message::KillTaskWorkers { controller, .. } => Some(controller),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_then_kill_broadcasts_once() {
        let (mut ctl, tracker, master) = setup();
        let mut rx = master.wire().subscribe();
        assert_eq!(ctl.status_text(), "None");

        ctl.start(&DTaskDef::new("t1", "fake"), Some("x")).unwrap();
        assert_eq!(tracker.inits.load(Ordering::SeqCst), 1);
        ctl.tick().unwrap();
        assert_eq!(ctl.status_text(), "ticks=1");

        assert!(ctl.kill());
        assert_eq!(kills(&mut rx), vec![ctl.token()]);
        assert_eq!(tracker.disposed.load(Ordering::SeqCst), 1);

        ctl.tick().unwrap();
        assert_eq!(ctl.status_text(), "None");
    }

    #[test]
    fn kill_without_script_is_noop() {
        let (mut ctl, tracker, master) = setup();
        let mut rx = master.wire().subscribe();
        assert!(!ctl.kill());

        ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();
        assert!(ctl.kill());
        assert!(!ctl.kill());
        assert_eq!(kills(&mut rx).len(), 1);
        assert_eq!(tracker.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finished_script_is_dropped_on_next_tick() {
        let (mut ctl, tracker, master) = setup();
        let mut rx = master.wire().subscribe();
        ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();
        ctl.tick().unwrap();
        assert!(ctl.is_running());

        tracker.finish.store(true, Ordering::SeqCst);
        ctl.tick().unwrap();
        assert!(!ctl.is_running());
        assert_eq!(ctl.status_text(), "None");
        assert_eq!(tracker.disposed.load(Ordering::SeqCst), 1);

        ctl.tick().unwrap();
        assert_eq!(tracker.ticks.load(Ordering::SeqCst), 2);
        assert!(kills(&mut rx).is_empty());
    }

    #[test]
    fn start_while_running_is_rejected() {
        let (mut ctl, tracker, _) = setup();
        let first = ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();

        let err = ctl.start(&DTaskDef::new("t2", "fake"), None).unwrap_err();
        assert_eq!(err, ScriptError::AlreadyRunning { id: "t1".into() });
        assert_eq!(ctl.instance(), Some(first));
        assert_eq!(tracker.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_launch_gets_a_fresh_instance_under_the_same_token() {
        let (mut ctl, _, _) = setup();
        let token = ctl.token();
        let first = ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();
        ctl.kill();
        let second = ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();
        assert_ne!(first, second);
        assert_eq!(ctl.token(), token);
    }

    #[test]
    fn init_failure_disposes_and_propagates() {
        let (mut ctl, tracker, _) = setup();
        tracker.fail_init.store(true, Ordering::SeqCst);

        let err = ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap_err();
        assert_eq!(err, ScriptError::fail("init"));
        assert_eq!(tracker.disposed.load(Ordering::SeqCst), 1);
        assert!(!ctl.is_running());
        assert_eq!(ctl.status_text(), "None");
    }

    #[test]
    fn tick_error_propagates_and_keeps_script() {
        let (mut ctl, tracker, master) = setup();
        let mut rx = master.wire().subscribe();
        ctl.start(&DTaskDef::new("t1", "fake"), None).unwrap();
        tracker.fail_tick.store(true, Ordering::SeqCst);

        assert_eq!(ctl.tick(), Err(ScriptError::fail("tick")));
        assert!(ctl.is_running());

        assert!(ctl.remove_script());
        assert!(!ctl.is_running());
        assert_eq!(ctl.status_text(), "None");
        assert!(kills(&mut rx).is_empty());
    }

    #[test]
    fn unknown_script_fails_start() {
        let (mut ctl, _, _) = setup();
        let err = ctl.start(&DTaskDef::new("t1", "nope"), None).unwrap_err();
        assert_eq!(err.as_label(), "script_unknown");
        assert!(!ctl.is_running());
    }

    #[test]
    fn start_script_runs_a_ready_made_script() {
        let (mut ctl, tracker, _) = setup();
        ctl.start_script("adhoc", Box::new(Fake(Arc::clone(&tracker))))
            .unwrap();
        assert_eq!(ctl.id(), "adhoc");
        assert_eq!(tracker.inits.load(Ordering::SeqCst), 1);
        drop(ctl);
        assert_eq!(tracker.disposed.load(Ordering::SeqCst), 1);
    }
}
