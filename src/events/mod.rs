//! Supervisor events and the bus that carries them.
//!
//! - [`Event`], [`EventKind`]: what happened, to which worker, with which pid/status.
//! - [`Bus`]: bounded broadcast from the supervisor loop to the subscriber listener.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
