//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and
//! the two built-in subscribers every supervisor carries.
//!
//! ## Architecture
//! ```text
//! Supervisor ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                     │
//!                                          ┌──────────────────────────┼───────────┐
//!                                          ▼                          ▼           ▼
//!                                      LogWriter               StatusTracker   custom...
//!                                  (tracing records)       (per-worker state)
//! ```
//!
//! ## Subscriber types
//! - **Passive subscribers** observe and react to events (logging, metrics, alerts)
//! - **Stateful subscribers** maintain internal state from events (`StatusTracker`)

mod log;
mod set;
mod status;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use status::{StatusTracker, WorkerStatus};
pub use subscribe::Subscribe;
