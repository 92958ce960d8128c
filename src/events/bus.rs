//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking event publishing from the tick-driven automata.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                 Subscriber (one):
//!   AppRestarter    ──┐
//!   DTaskController ──┼──────► Bus ───────► Scheduler listener ────► SubscriberSet
//!   WorkerHost      ──┤  (broadcast chan)
//!   Scheduler       ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; safe to call from `tick()`.
//! - **Owned sequence**: each bus stamps its own monotonic `seq`; clones share it.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: events are lost if there are no active subscribers at send time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone; clones publish into the same channel and share the sequence counter.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Event>(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Stamps the next sequence number and publishes to all active subscribers.
    pub fn publish(&self, mut ev: Event) {
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn clones_share_sequence() {
        let bus = Bus::new(8);
        let other = bus.clone();
        let mut rx = bus.subscribe();

        bus.publish(Event::new(EventKind::ShutdownRequested));
        other.publish(Event::new(EventKind::ShutdownRequested));

        let a = rx.try_recv().unwrap();
        let b = rx.try_recv().unwrap();
        assert!(b.seq > a.seq);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = Bus::new(1);
        bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
