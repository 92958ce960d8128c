//! # fleetvisor
//!
//! **Fleetvisor** is the supervision core of a fleet master: it restarts app
//! processes that die and runs distributed tasks whose controller half lives
//! on the master and whose worker halves live on agents.
//!
//! Everything is driven by one tick-per-cycle loop; no `tick` ever blocks.
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Scheduler (tick loop)                                               │
//! │  - AppRegistry      AppId ─► (AppDef, AppStateHandle)                │
//! │  - restarters       AppId ─► AppRestarter                            │
//! │  - tasks            ControllerToken ─► DTaskController               │
//! │  - Master           ScriptFactory + MessageBus (wire) + Bus (events) │
//! └──────┬──────────────────────────┬────────────────────────────────────┘
//!        ▼ tick()                   ▼ tick()
//!  ┌──────────────┐          ┌─────────────────┐   StartTaskWorker   ┌────────────┐
//!  │ AppRestarter │          │ DTaskController │ ──────────────────► │ WorkerHost │
//!  │ (one episode)│          │ controller      │ ◄────────────────── │ (agent)    │
//!  └──────┬───────┘          │ Script          │   TaskWorkerReport  │ worker     │
//!         │ launch_app       └───────┬─────────┘ ──────────────────► │ Scripts    │
//!         ▼                          │           KillTaskWorkers     └────────────┘
//!    AppLauncher                     │
//!                                    ▼
//!          publish(Event) ─► Bus ─► listener ─► SubscriberSet ─► LogWriter, ...
//! ```
//!
//! ### Restart episode
//! ```text
//! Init ─► WaitingForDeath ─► WaitBeforeRestart ─► WaitingBeforeRestart ─► Restart ─► Disabled
//!   (see AppRestarter for the exact transition rules)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                                |
//! |-------------------|----------------------------------------------------------|---------------------------------------------------|
//! | **Apps**          | Live state, restart automaton, launch capability.        | [`AppState`], [`AppRestarter`], [`AppLauncher`]   |
//! | **Policies**      | Inline restart block, validated once.                    | [`RestartPolicy`], [`RestartsRemaining`]          |
//! | **Tasks**         | Controller side of distributed tasks.                    | [`DTaskController`], [`DTaskDef`]                 |
//! | **Scripts**       | Poll-based scripts, async routines, factories.           | [`Script`], [`Routine`], [`ScriptRegistry`]       |
//! | **Protocol**      | Controller/worker messages and the agent-side host.      | [`Message`], [`WorkerHost`]                       |
//! | **Events**        | Runtime events and subscribers.                          | [`Event`], [`Subscribe`], [`LogWriter`]           |
//! | **Errors**        | Typed errors with stable labels.                         | [`ConfigError`], [`ScriptError`], [`LaunchError`] |
//! | **Configuration** | Scheduler settings loaded from TOML.                     | [`SchedulerConfig`], [`load_config`]              |
//!
//! ## Optional features
//! - `logging`: exposes [`logging::init`], a `tracing-subscriber` setup driven by `RUST_LOG`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use fleetvisor::{
//!     AppDef, AppId, AppLauncher, DTaskDef, LaunchError, Scheduler, SchedulerConfig,
//!     ScriptRegistry,
//! };
//!
//! struct Spawner;
//!
//! impl AppLauncher for Spawner {
//!     fn launch_app(&self, id: &AppId, _reset: bool) -> Result<(), LaunchError> {
//!         println!("launching {id}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut sched = Scheduler::new(
//!         SchedulerConfig::default(),
//!         Arc::new(ScriptRegistry::with_builtins()),
//!         Arc::new(Spawner),
//!     )?;
//!
//!     let web: AppId = "m1.web".parse()?;
//!     sched.register_app(AppDef::new(web.clone()).with_restarter("delay = 2.5\nmaxTries = 5"));
//!     sched.restart_app(&web, false)?;
//!
//!     let token = sched.start_task(&DTaskDef::new("collect", "gather"), Some("m1,m2"))?;
//!     sched.tick();
//!     println!("task: {:?}", sched.task_status(token));
//!     Ok(())
//! }
//! ```

mod app;
mod controller;
mod core;
mod error;
mod events;
mod policies;
mod protocol;
mod subscribers;
mod tasks;

#[cfg(feature = "logging")]
pub mod logging;

// ---- Public re-exports ----

pub use app::{
    AppDef, AppId, AppLauncher, AppRegistry, AppRestarter, AppState, AppStateHandle,
    RestartsRemaining, RestarterParams, RestarterPhase,
};
pub use controller::{DTaskController, DTaskDef, DTaskState, NO_SCRIPT_STATUS};
pub use self::core::{Master, Scheduler, SchedulerConfig, cancel_on_signal, load_config};
pub use error::{ConfigError, LaunchError, SchedulerError, ScriptError};
pub use events::{Bus, Event, EventKind};
pub use policies::RestartPolicy;
pub use protocol::{
    ControllerToken, Message, MessageBus, TaskInstanceId, WorkerHost, WorkerOutcome, WorkerReport,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{
    AgentReport, AsyncScript, Routine, RoutineFn, RoutineRef, Script, ScriptContext,
    ScriptFactory, ScriptRegistry, ScriptRequest, ScriptRole,
};
