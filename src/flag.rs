//! # Cooperative, monotonic shutdown flag.
//!
//! One [`ShutdownFlag`] exists per process: the supervisor owns one, and every
//! worker process installs its own at boot. The flag only ever goes from unset to
//! set; loops observe it at their safe points and decide whether to keep iterating.

use tokio_util::sync::CancellationToken;

/// Monotonic stop signal backed by a [`CancellationToken`].
///
/// Clones share state: setting any clone sets them all.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    token: CancellationToken,
}

impl ShutdownFlag {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Idempotent.
    pub fn set(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the flag has been set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the flag is set (immediately if it already is).
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
