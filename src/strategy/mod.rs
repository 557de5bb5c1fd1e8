//! # Execution strategies.
//!
//! A worker's `type` selects the strategy that drives its target inside the worker
//! process. Two strategies are built in:
//!
//! - `map` ([`MapStrategy`]) pulls items from a `source` queue and hands each one to a
//!   map target, sleeping `sleep` (default 1s) whenever the queue is empty.
//! - `custom` ([`CustomStrategy`]) calls a custom target once and returns with it.
//!
//! ```text
//! worker::boot ──► Strategies::dispatch(type) ──► Strategy::run(event, definition, targets)
//!                                                   ├─ map:    loop { checkout → target(item) → release }
//!                                                   └─ custom: target(event, kwargs)
//! ```
//!
//! The table is built once at startup ([`Strategies::builder`]) and never mutated.

mod custom;
mod map;
mod registry;

use async_trait::async_trait;

pub use custom::CustomStrategy;
pub use map::MapStrategy;
pub use registry::{Strategies, StrategiesBuilder};

use crate::error::{ConfigurationError, WorkerError};
use crate::flag::ShutdownFlag;
use crate::targets::Targets;
use crate::topology::WorkerDefinition;

/// Behavior bound to a worker type tag.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    /// Checks that `def` can be driven by this strategy, without side effects.
    fn validate(&self, def: &WorkerDefinition, targets: &Targets)
    -> Result<(), ConfigurationError>;

    /// Runs the worker until it is done, fails, or observes `event`.
    async fn run(
        &self,
        event: ShutdownFlag,
        def: WorkerDefinition,
        targets: &Targets,
    ) -> Result<(), WorkerError>;
}
