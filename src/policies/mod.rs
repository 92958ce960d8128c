//! Restart policies.
//!
//! This module groups the knobs that control **whether** and **when** a dead
//! app is relaunched.
//!
//! ## Contents
//! - [`RestartPolicy`] relaunch delay and total relaunch budget (`maxTries`)
//!
//! ## Quick wiring
//! ```text
//! AppDef { restarter: Option<inline block> }
//!      └─► AppRestarter::new parses the block once:
//!           - delay     → WaitingBeforeRestart threshold
//!           - max_tries → seeds AppState::restarts_remaining when uninitialized
//! ```
//!
//! ## Defaults
//! - `delay = 1.0s`, `max_tries = -1` (unlimited).

mod restart;

pub use restart::RestartPolicy;
