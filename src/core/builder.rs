//! # Supervisor builder.
//!
//! Collects the registries, the launcher and the subscribers, then loads and
//! validates the topology eagerly: a topology naming an unknown type or target is
//! rejected here, before any process exists.
//!
//! ```text
//! SupervisorBuilder::new(topology)
//!     .with_strategies(..)   default: Strategies::builtin()
//!     .with_targets(..)      default: targets::builtin()
//!     .with_launcher(..)     default: ProcessLauncher::current_exe()
//!     .with_subscribers(..)  LogWriter and StatusTracker are always present
//!     .build()  ──► validate ──► Supervisor
//! ```

use std::path::Path;
use std::sync::Arc;

use super::launcher::{Launcher, ProcessLauncher};
use super::supervisor::{Supervisor, SupervisorParts};
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::strategy::Strategies;
use crate::subscribers::{LogWriter, StatusTracker, Subscribe, SubscriberSet};
use crate::targets::{self, Targets};
use crate::topology::Topology;

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    topology: Topology,
    strategies: Option<Strategies>,
    targets: Option<Targets>,
    launcher: Option<Arc<dyn Launcher>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    os_signals: bool,
}

impl SupervisorBuilder {
    /// Starts from an already loaded topology.
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            strategies: None,
            targets: None,
            launcher: None,
            subscribers: Vec::new(),
            os_signals: true,
        }
    }

    /// Loads the topology at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        Ok(Self::new(Topology::load(path).await?))
    }

    /// Replaces the strategy table.
    pub fn with_strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = Some(strategies);
        self
    }

    /// Replaces the target table.
    ///
    /// Must match the table the worker processes dispatch with.
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Replaces the process launcher.
    pub fn with_launcher(mut self, launcher: impl Launcher) -> Self {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Adds event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    /// Whether `run` installs SIGINT/SIGTERM/SIGQUIT/SIGUSR1 handlers (default `true`).
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Validates the topology and builds the supervisor.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<Supervisor, RuntimeError> {
        let strategies = self.strategies.unwrap_or_else(Strategies::builtin);
        let targets = self.targets.unwrap_or_else(targets::builtin);
        self.topology.validate(&strategies, &targets)?;

        let launcher = match self.launcher {
            Some(l) => l,
            None => Arc::new(ProcessLauncher::current_exe().map_err(RuntimeError::CurrentExe)?),
        };

        let bus = Bus::new(self.topology.supervisor().bus_capacity);
        let status = Arc::new(StatusTracker::new());
        let mut subscribers: Vec<Arc<dyn Subscribe>> =
            vec![Arc::new(LogWriter::new()), status.clone()];
        subscribers.extend(self.subscribers);
        let subs = SubscriberSet::new(subscribers, bus.clone());

        Ok(Supervisor::from_parts(SupervisorParts {
            topology: self.topology,
            strategies: Arc::new(strategies),
            targets: Arc::new(targets),
            launcher,
            bus,
            subs,
            status,
            os_signals: self.os_signals,
        }))
    }
}
