//! # Restart policies for worker processes.
//!
//! [`RestartPolicy`] determines whether a worker is respawned after its process exits.
//!
//! - [`RestartPolicy::Always`] the worker is respawned after any exit (default).
//! - [`RestartPolicy::OnFailure`] only a failed exit (nonzero status, death by signal) respawns.
//! - [`RestartPolicy::Never`] the worker runs once.
//!
//! ```text
//! Long-running workers (loop until stopped):
//!   RestartPolicy::Always      → any exit → respawn (crash and clean exit alike)
//!
//! Drain-and-finish workers:
//!   RestartPolicy::OnFailure   → exit 0 ends the worker, crashes respawn
//!
//! One-shot workers:
//!   RestartPolicy::Never       → runs once, never respawned
//! ```

use serde::Deserialize;

use crate::core::ExitStatus;

/// Policy controlling whether a worker is respawned after its process exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Respawn after every exit, whatever the status.
    #[default]
    Always,
    /// Respawn only after a failed exit.
    OnFailure,
    /// Never respawn.
    Never,
}

impl RestartPolicy {
    /// Returns `true` when a process that ended with `status` should be respawned.
    pub fn allows(&self, status: ExitStatus) -> bool {
        match self {
            RestartPolicy::Always => true,
            RestartPolicy::OnFailure => !status.success(),
            RestartPolicy::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_ignores_exit_status() {
        assert!(RestartPolicy::Always.allows(ExitStatus::Exited(0)));
        assert!(RestartPolicy::Always.allows(ExitStatus::Exited(1)));
        assert!(RestartPolicy::Always.allows(ExitStatus::Signaled(9)));
    }

    #[test]
    fn on_failure_skips_clean_exit() {
        assert!(!RestartPolicy::OnFailure.allows(ExitStatus::Exited(0)));
        assert!(RestartPolicy::OnFailure.allows(ExitStatus::Exited(2)));
        assert!(RestartPolicy::OnFailure.allows(ExitStatus::Unknown));
    }

    #[test]
    fn parses_snake_case() {
        let p: RestartPolicy = serde_yaml::from_str("on_failure").unwrap();
        assert_eq!(p, RestartPolicy::OnFailure);
        let p: RestartPolicy = serde_yaml::from_str("never").unwrap();
        assert_eq!(p, RestartPolicy::Never);
    }
}
