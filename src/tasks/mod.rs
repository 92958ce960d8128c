//! # Scripts and their async bodies.
//!
//! - [`Script`] poll-based lifecycle driven by controllers and worker hosts
//! - [`Routine`] / [`RoutineFn`] async, cancellable script bodies
//! - [`AsyncScript`] hosts a routine behind the [`Script`] façade
//! - [`ScriptContext`] what a running routine can see and do
//! - [`ScriptFactory`] / [`ScriptRegistry`] creation of fresh scripts

mod async_script;
mod builtin;
mod context;
mod factory;
mod routine;
mod script;

pub use async_script::AsyncScript;
pub use context::{AgentReport, ScriptContext};
pub use factory::{ScriptFactory, ScriptRegistry, ScriptRequest, ScriptRole};
pub use routine::{Routine, RoutineFn, RoutineRef};
pub use script::Script;
