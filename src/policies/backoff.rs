//! # Respawn backoff.
//!
//! A worker that keeps dying before it counts as healthy is respawned after a
//! growing delay. The `n`-th consecutive short run waits `first × factor^n`,
//! capped at `max`, then spread by the [`JitterPolicy`]. Every delay is derived
//! from `n` alone; a jittered value never feeds into the next one.
//!
//! In a topology file:
//! ```yaml
//! supervisor:
//!   backoff: { first: 1s, max: 30s, factor: 2.0, jitter: equal }
//! ```
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use topovisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::policies::jitter::JitterPolicy;

/// Delay growth for workers that keep dying early.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffPolicy {
    /// Delay after the first short run.
    #[serde(deserialize_with = "crate::durations::deserialize")]
    pub first: Duration,
    /// Upper bound for any delay.
    #[serde(deserialize_with = "crate::durations::deserialize")]
    pub max: Duration,
    /// Growth per consecutive short run.
    pub factor: f64,
    /// Randomization applied to the capped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `max = 30s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Delay before respawning after `streak` earlier consecutive short runs.
    ///
    /// Overflowing, negative or non-finite products collapse to `max`.
    pub fn next(&self, streak: u32) -> Duration {
        let exp = i32::try_from(streak).unwrap_or(i32::MAX);
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max));
        self.jitter.spread(base, self.first.min(self.max), self.max)
    }
}
