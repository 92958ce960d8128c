//! # Controller/worker task protocol.
//!
//! ```text
//!   master                                         agent(s)
//!   DTaskController ── StartTaskWorker ──────────► WorkerHost ─► worker script
//!   controller script ◄── TaskWorkerReport ─────── worker script
//!   DTaskController ── KillTaskWorkers (once) ───► WorkerHost ─► dispose all for token
//! ```
//!
//! Delivery is at-most-once and unacknowledged. Controller scripts detect
//! unresponsive workers themselves; the kill broadcast is the only cleanup.

mod message;
mod token;
mod wire;
mod worker;

pub use message::{Message, WorkerOutcome, WorkerReport};
pub use token::{ControllerToken, TaskInstanceId};
pub use wire::MessageBus;
pub use worker::WorkerHost;
