//! # Jitter for respawn delays.
//!
//! Workers that share a dependency tend to crash together. Without jitter they
//! would also come back together, on the same supervisor tick. [`JitterPolicy`]
//! spreads each computed backoff delay:
//!
//! | policy         | resulting delay                              |
//! |----------------|----------------------------------------------|
//! | `none`         | `d`                                          |
//! | `full`         | uniform in `[0, d]`                          |
//! | `equal`        | `d/2` + uniform in `[0, d/2]`                |
//! | `decorrelated` | uniform in `[floor, min(3·d, cap)]`          |

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// How a respawn delay is randomized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Exact delays.
    #[default]
    None,
    /// Anywhere between zero and the delay.
    Full,
    /// Keeps at least half of the delay.
    Equal,
    /// Between `floor` and three times the delay, capped.
    Decorrelated,
}

impl JitterPolicy {
    /// Spreads `delay`.
    ///
    /// `floor` and `cap` only bound the `decorrelated` range.
    pub fn spread(self, delay: Duration, floor: Duration, cap: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(uniform(0, ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + uniform(0, ms - half))
            }
            JitterPolicy::Decorrelated => {
                let lo = millis(floor);
                let hi = ms.saturating_mul(3).min(millis(cap)).max(lo);
                Duration::from_millis(uniform(lo, hi))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn uniform(lo: u64, hi: u64) -> u64 {
    if lo >= hi {
        lo
    } else {
        rand::rng().random_range(lo..=hi)
    }
}
