//! # Subscriber trait.
//!
//! Implement [`Subscribe`] to observe supervisor events: alerting on crash loops,
//! exporting counters, mirroring worker status somewhere else. Every subscriber
//! gets its own queue and task inside the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), so a slow one delays only
//! itself. When its queue is full the event is dropped for that subscriber and a
//! `SubscriberOverflow` event is published instead.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! use async_trait::async_trait;
//! use topovisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct CrashCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for CrashCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerExited && ev.status.is_some_and(|s| !s.success()) {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "crash-counter"
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of supervisor events.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event. A panic here is caught and reported as `SubscriberPanicked`.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events that may wait in this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
