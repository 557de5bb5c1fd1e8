//! # Event bus.
//!
//! [`Bus`] carries [`Event`]s from their publishers to the single listener that
//! feeds the [`SubscriberSet`](crate::SubscriberSet):
//!
//! ```text
//!   supervisor loop ──┐
//!   SubscriberSet   ──┴──► Bus (broadcast ring) ──► subscriber_listener ──► SubscriberSet::emit
//! ```
//!
//! Publishing never waits. The ring keeps the last `capacity` events (the
//! `supervisor.bus_capacity` setting); a listener that falls further behind skips
//! the oldest ones and sees `RecvError::Lagged`. Events published while nobody
//! listens are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Cloneable publishing handle over a bounded broadcast ring.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus holding up to `capacity` undelivered events (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Publishes `ev`; dropped when there is no receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
