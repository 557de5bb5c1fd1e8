//! # Targets: the domain logic behind each worker.
//!
//! Targets are registered by name at startup into an immutable [`Targets`] table.
//! The supervisor validates every worker's `target` against that table before the
//! first spawn, so a misspelled or mis-kinded target is reported immediately.

mod builtin;
mod registry;
mod target;

pub use builtin::{builtin, register_builtin};
pub use registry::{Targets, TargetsBuilder};
pub use target::{CustomFn, CustomTarget, MapFn, MapTarget, Target, TargetKind};
