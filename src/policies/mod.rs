//! Restart policies for worker processes.
//!
//! This module groups the knobs that control **if/when** a worker is restarted
//! after its process exits and **how long** to wait before the next spawn.
//!
//! ## Contents
//! - [`RestartPolicy`] when to restart a worker (always / on-failure / never)
//! - [`RestartLimit`]  cap on restarts within a sliding window
//! - [`BackoffPolicy`] how respawn delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid thundering herd
//!
//! ## Quick wiring
//! ```text
//! SupervisorConfig { restart, max_restarts, restart_window, healthy_after, backoff }
//!      └─► core::supervisor::Supervisor on every exit:
//!           - RestartHistory::decide() → Restart(delay) | Exhausted(reason)
//!           - Restart(delay) pushes the name back on the restart queue
//! ```
//!
//! ## Defaults
//! - `RestartPolicy::Always` (a worker is expected to run forever).
//! - `RestartLimit` unlimited.
//! - `BackoffPolicy::default()` → first=1s, factor=2.0, max=30s, jitter=None.

mod backoff;
mod jitter;
mod limit;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use limit::RestartLimit;
pub(crate) use limit::{Decision, RestartHistory, RestartRules};
pub use restart::RestartPolicy;
