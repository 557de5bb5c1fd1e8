//! # Supervisor configuration.
//!
//! Read from the optional `supervisor` key of the topology file. Every field has a
//! default, so an absent key (or an empty mapping) gives the classic behavior: a
//! 5s tick, restart everything forever, long-lived workers come back at once.
//!
//! ```yaml
//! supervisor:
//!   tick: 5s
//!   grace: 10s
//!   restart: always        # always | on_failure | never
//!   max_restarts: 0        # 0 = unlimited
//!   restart_window: 60s
//!   healthy_after: 10s
//!   backoff: { first: 1s, max: 30s, factor: 2.0, jitter: none }
//! ```
//!
//! ## Sentinel values
//! - `max_restarts = 0` → unlimited
//! - `grace = 0s` → kill survivors as soon as SIGTERM has been sent
//! - `tick = 0s` is rejected

use std::time::Duration;

use serde::Deserialize;

use crate::policies::{BackoffPolicy, RestartLimit, RestartPolicy, RestartRules};

/// Settings of the supervisor loop.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    /// Longest the loop sleeps between restart-queue drains (must be non-zero).
    #[serde(deserialize_with = "crate::durations::nonzero")]
    pub tick: Duration,

    /// How long stop and reboot wait after SIGTERM before sending SIGKILL.
    #[serde(deserialize_with = "crate::durations::deserialize")]
    pub grace: Duration,

    /// Capacity of the event bus ring buffer (min 1).
    pub bus_capacity: usize,

    /// Which exits lead to a respawn.
    pub restart: RestartPolicy,

    /// Restarts allowed per worker within `restart_window` (`0` = unlimited).
    pub max_restarts: u32,

    /// Sliding window for `max_restarts`.
    #[serde(deserialize_with = "crate::durations::deserialize")]
    pub restart_window: Duration,

    /// A run at least this long counts as healthy: respawn at once, reset backoff.
    #[serde(deserialize_with = "crate::durations::deserialize")]
    pub healthy_after: Duration,

    /// Delay growth for workers that keep dying early.
    pub backoff: BackoffPolicy,
}

impl SupervisorConfig {
    /// Restart cap derived from `max_restarts` and `restart_window`.
    #[inline]
    pub fn limit(&self) -> RestartLimit {
        RestartLimit {
            max_restarts: self.max_restarts,
            window: self.restart_window,
        }
    }

    pub(crate) fn rules(&self) -> RestartRules {
        RestartRules {
            restart: self.restart,
            limit: self.limit(),
            backoff: self.backoff,
            healthy_after: self.healthy_after,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            restart: RestartPolicy::Always,
            max_restarts: 0,
            restart_window: Duration::from_secs(60),
            healthy_after: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    #[test]
    fn empty_mapping_gives_defaults() {
        let cfg: SupervisorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, SupervisorConfig::default());
        assert!(cfg.limit().is_unlimited());
    }

    #[test]
    fn partial_override() {
        let cfg: SupervisorConfig = serde_yaml::from_str(
            "grace: 500ms\nmax_restarts: 3\nbackoff: { first: 2s, jitter: full }",
        )
        .unwrap();
        assert_eq!(cfg.grace, Duration::from_millis(500));
        assert_eq!(cfg.tick, Duration::from_secs(5));
        assert_eq!(cfg.limit().max_restarts, 3);
        assert_eq!(cfg.backoff.first, Duration::from_secs(2));
        assert_eq!(cfg.backoff.max, Duration::from_secs(30));
        assert_eq!(cfg.backoff.jitter, JitterPolicy::Full);
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(serde_yaml::from_str::<SupervisorConfig>("tik: 5s").is_err());
    }

    #[test]
    fn zero_tick_is_rejected() {
        for yaml in ["tick: 0s", "tick: 0", "tick: 0.0"] {
            let err = serde_yaml::from_str::<SupervisorConfig>(yaml).unwrap_err();
            assert!(err.to_string().contains("greater than zero"), "{yaml}: {err}");
        }
        let cfg: SupervisorConfig = serde_yaml::from_str("tick: 10ms
grace: 0s").unwrap();
        assert_eq!(cfg.tick, Duration::from_millis(10));
        assert_eq!(cfg.grace, Duration::ZERO);
    }
}
