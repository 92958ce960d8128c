//! Runtime core: shared services and the scheduling loop.
//!
//! - [`Master`] factory, message wire and event bus shared by every automaton
//! - [`SchedulerConfig`] / [`load_config`] loop settings
//! - [`Scheduler`] owns apps, restarters and task controllers and ticks them
//! - `shutdown` termination signals as a cancellation source

mod config;
mod master;
mod scheduler;
mod shutdown;

pub use config::{SchedulerConfig, load_config};
pub use master::Master;
pub use scheduler::Scheduler;
pub use shutdown::cancel_on_signal;
