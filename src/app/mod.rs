//! # Apps: identity, live state and the restart automaton.
//!
//! - [`AppId`] compound `machine.app` identity
//! - [`AppState`] / [`AppStateHandle`] live status record and its shared handle
//! - [`AppDef`] static definition (restart block, kill-tree flag)
//! - [`AppLauncher`] process-launch capability
//! - [`AppRestarter`] per-app restart episode
//! - [`AppRegistry`] definitions and states keyed by id

mod def;
mod id;
mod launcher;
mod registry;
mod restarter;
mod state;

pub use def::AppDef;
pub use id::AppId;
pub use launcher::AppLauncher;
pub use registry::AppRegistry;
pub use restarter::{AppRestarter, RestarterParams, RestarterPhase};
pub use state::{AppState, AppStateHandle, RestartsRemaining};
