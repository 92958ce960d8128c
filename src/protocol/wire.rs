//! # In-process wire for protocol messages.
//!
//! [`MessageBus`] is a thin wrapper around [`tokio::sync::broadcast`] standing
//! in for the master/agent transport: every message sent is seen by every
//! subscriber (agents filter by address, controllers by token).
//!
//! ## Rules
//! - **Non-blocking send**: `send()` never blocks and never fails.
//! - **At-most-once**: a message sent with no subscribers is lost; lagging
//!   subscribers observe `RecvError::Lagged(n)` and skip `n` messages.

use tokio::sync::broadcast;

use super::message::Message;

/// Broadcast channel carrying [`Message`]s between the master and agents.
#[derive(Clone, Debug)]
pub struct MessageBus {
    tx: broadcast::Sender<Message>,
}

impl MessageBus {
    /// Creates a bus with the given ring-buffer capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends a message to every current subscriber; fire-and-forget.
    pub fn send(&self, msg: Message) {
        tracing::trace!(kind = msg.as_label(), controller = %msg.controller(), "wire send");
        let _ = self.tx.send(msg);
    }

    /// New independent receiver for messages sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
