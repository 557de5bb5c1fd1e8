//! # Restart limit and per-worker restart history.
//!
//! [`RestartLimit`] bounds how many times one worker may be respawned within a
//! sliding window. [`RestartHistory`] is the supervisor's per-worker bookkeeping:
//! it combines the restart policy, the limit and the backoff into one [`Decision`]
//! each time a process exits.
//!
//! ## Rules
//! - A run that lasted at least `healthy_after` is respawned **without delay** and
//!   resets the consecutive counter.
//! - Shorter runs are respawned after `backoff.next(consecutive)`; the counter grows.
//! - With `max_restarts > 0`, the `max_restarts + 1`-th restart inside `window`
//!   exhausts the worker for good.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::ExitStatus;
use crate::policies::{BackoffPolicy, RestartPolicy};

/// Cap on restarts of a single worker inside a sliding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartLimit {
    /// Maximum restarts inside `window` (`0` = unlimited).
    pub max_restarts: u32,
    /// Length of the sliding window.
    pub window: Duration,
}

impl RestartLimit {
    /// A limit that never triggers.
    pub const UNLIMITED: RestartLimit = RestartLimit {
        max_restarts: 0,
        window: Duration::ZERO,
    };

    /// Returns `true` when the limit never triggers.
    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.max_restarts == 0
    }
}

/// Outcome of an exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Push the worker back on the restart queue, spawnable after `delay`.
    Restart { delay: Duration },
    /// Give up on the worker.
    Exhausted { reason: String },
}

/// Everything the supervisor needs to decide what happens after an exit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RestartRules {
    pub restart: RestartPolicy,
    pub limit: RestartLimit,
    pub backoff: BackoffPolicy,
    pub healthy_after: Duration,
}

/// Per-worker restart bookkeeping, owned by the supervisor.
#[derive(Debug, Default)]
pub(crate) struct RestartHistory {
    consecutive: u32,
    recent: VecDeque<Instant>,
}

impl RestartHistory {
    /// Decides what happens to a worker whose process ended with `status` after running for `ran`.
    pub fn decide(
        &mut self,
        rules: &RestartRules,
        status: ExitStatus,
        ran: Duration,
        now: Instant,
    ) -> Decision {
        if !rules.restart.allows(status) {
            return Decision::Exhausted {
                reason: format!("restart policy {:?} stops after {status}", rules.restart),
            };
        }

        if !rules.limit.is_unlimited() {
            while let Some(first) = self.recent.front() {
                if now.saturating_duration_since(*first) > rules.limit.window {
                    self.recent.pop_front();
                } else {
                    break;
                }
            }
            if self.recent.len() >= rules.limit.max_restarts as usize {
                return Decision::Exhausted {
                    reason: format!(
                        "{} restarts within {:?}",
                        self.recent.len(),
                        rules.limit.window
                    ),
                };
            }
            self.recent.push_back(now);
        }

        if ran >= rules.healthy_after {
            self.consecutive = 0;
            return Decision::Restart {
                delay: Duration::ZERO,
            };
        }

        let delay = rules.backoff.next(self.consecutive);
        self.consecutive = self.consecutive.saturating_add(1);
        Decision::Restart { delay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;

    fn rules() -> RestartRules {
        RestartRules {
            restart: RestartPolicy::Always,
            limit: RestartLimit::UNLIMITED,
            backoff: BackoffPolicy {
                first: Duration::from_secs(1),
                max: Duration::from_secs(8),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            healthy_after: Duration::from_secs(10),
        }
    }

    fn delay(d: Decision) -> Duration {
        match d {
            Decision::Restart { delay } => delay,
            other => panic!("expected restart, got {other:?}"),
        }
    }

    #[test]
    fn short_runs_back_off_then_healthy_run_resets() {
        let r = rules();
        let mut h = RestartHistory::default();
        let now = Instant::now();
        let short = Duration::from_millis(100);

        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(1));
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(2));
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(4));
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(8));
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(8));

        let long = Duration::from_secs(60);
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(0), long, now)), Duration::ZERO);
        assert_eq!(delay(h.decide(&r, ExitStatus::Exited(1), short, now)), Duration::from_secs(1));
    }

    #[test]
    fn limit_exhausts_inside_window_only() {
        let mut r = rules();
        r.limit = RestartLimit {
            max_restarts: 2,
            window: Duration::from_secs(60),
        };
        let mut h = RestartHistory::default();
        let t0 = Instant::now();
        let ran = Duration::from_secs(30);

        assert!(matches!(h.decide(&r, ExitStatus::Exited(1), ran, t0), Decision::Restart { .. }));
        assert!(matches!(
            h.decide(&r, ExitStatus::Exited(1), ran, t0 + Duration::from_secs(10)),
            Decision::Restart { .. }
        ));
        assert!(matches!(
            h.decide(&r, ExitStatus::Exited(1), ran, t0 + Duration::from_secs(20)),
            Decision::Exhausted { .. }
        ));
        // The first restart has left the window.
        assert!(matches!(
            h.decide(&r, ExitStatus::Exited(1), ran, t0 + Duration::from_secs(61)),
            Decision::Restart { .. }
        ));
    }

    #[test]
    fn policy_never_exhausts_immediately() {
        let mut r = rules();
        r.restart = RestartPolicy::Never;
        let mut h = RestartHistory::default();
        let d = h.decide(&r, ExitStatus::Exited(1), Duration::ZERO, Instant::now());
        assert!(matches!(d, Decision::Exhausted { .. }));
    }

    #[test]
    fn on_failure_exhausts_clean_exit() {
        let mut r = rules();
        r.restart = RestartPolicy::OnFailure;
        let mut h = RestartHistory::default();
        let now = Instant::now();
        assert!(matches!(
            h.decide(&r, ExitStatus::Signaled(15), Duration::ZERO, now),
            Decision::Restart { .. }
        ));
        assert!(matches!(
            h.decide(&r, ExitStatus::Exited(0), Duration::ZERO, now),
            Decision::Exhausted { .. }
        ));
    }
}
