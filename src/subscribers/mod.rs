//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//!   AppRestarter / DTaskController ── publish(Event) ──► Bus
//!                                                         │
//!                                       Scheduler listener ► SubscriberSet::emit
//!                                                         │
//!                                            ┌────────────┼────────────┐
//!                                            ▼            ▼            ▼
//!                                        LogWriter     Metrics      Custom
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
