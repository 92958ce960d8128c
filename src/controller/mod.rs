//! # Distributed task controller (master side).
//!
//! - [`DTaskDef`] static task definition
//! - [`DTaskController`] owns one task instance's controller script
//! - [`DTaskState`] status text refreshed every tick

mod core;
mod def;
mod state;

pub use self::core::DTaskController;
pub use def::DTaskDef;
pub use state::{DTaskState, NO_SCRIPT_STATUS};
