//! Error types used by the supervisor, the worker bootstrap and user targets.
//!
//! The taxonomy follows the process boundary:
//!
//! - [`TopologyError`]: the topology file could not be read or understood.
//! - [`ConfigurationError`]: the topology names something that is not registered
//!   (unknown worker type, unknown target, target of the wrong kind).
//! - [`TargetError`]: raised by user-supplied domain logic; always fatal to the worker process.
//! - [`QueueError`]: a queue backend failed; fatal to the worker process.
//! - [`WorkerError`]: everything that can end a worker process with a failure exit.
//! - [`RuntimeError`]: failures of the supervisor itself.
//!
//! Every type provides `as_label` (a short stable snake_case label for logs).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::targets::TargetKind;

/// # Errors produced while loading a topology file.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TopologyError {
    /// The file could not be read.
    #[error("cannot read topology {path:?}: {source}")]
    Read {
        /// Path of the topology file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or its top level is not a mapping.
    #[error("cannot parse topology {path:?}: {source}")]
    Parse {
        /// Path of the topology file.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The top level has no usable `workers` list.
    #[error("topology has no `workers` list")]
    MissingWorkers,

    /// The same worker name is listed twice.
    #[error("worker {name:?} is listed more than once")]
    DuplicateWorker {
        /// Offending worker name.
        name: String,
    },

    /// A worker (or queue) name has no top-level entry.
    #[error("no definition for {name:?}")]
    MissingDefinition {
        /// Missing entry name.
        name: String,
    },

    /// An entry exists but does not deserialize into the expected shape.
    #[error("invalid definition for {name:?}: {source}")]
    InvalidDefinition {
        /// Entry name.
        name: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

impl TopologyError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TopologyError::Read { .. } => "topology_read",
            TopologyError::Parse { .. } => "topology_parse",
            TopologyError::MissingWorkers => "topology_missing_workers",
            TopologyError::DuplicateWorker { .. } => "topology_duplicate_worker",
            TopologyError::MissingDefinition { .. } => "topology_missing_definition",
            TopologyError::InvalidDefinition { .. } => "topology_invalid_definition",
        }
    }
}

/// # Errors raised when a topology refers to something that is not registered.
///
/// The supervisor checks every worker eagerly at startup (and on reboot), so these
/// surface before the first process is spawned. A worker that still hits one at
/// boot exits with a failure status.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The worker definition itself could not be resolved.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// No strategy is registered for the worker's `type`.
    #[error("worker {worker:?}: unknown worker type {kind:?}")]
    UnknownType {
        /// Worker name.
        worker: String,
        /// Requested type tag.
        kind: String,
    },

    /// No target is registered under the worker's `target` name.
    #[error("worker {worker:?}: unknown target {target:?}")]
    UnknownTarget {
        /// Worker name.
        worker: String,
        /// Requested target name.
        target: String,
    },

    /// The target exists but cannot be driven by the worker's strategy.
    #[error("worker {worker:?}: target {target:?} is a {found} target, {expected} required")]
    TargetKind {
        /// Worker name.
        worker: String,
        /// Requested target name.
        target: String,
        /// Kind the strategy drives.
        expected: TargetKind,
        /// Kind the target was registered as.
        found: TargetKind,
    },

    /// A `map` worker has no `source` queue.
    #[error("worker {worker:?}: map worker requires a `source` queue")]
    MissingSource {
        /// Worker name.
        worker: String,
    },
}

impl ConfigurationError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigurationError::Topology(e) => e.as_label(),
            ConfigurationError::UnknownType { .. } => "config_unknown_type",
            ConfigurationError::UnknownTarget { .. } => "config_unknown_target",
            ConfigurationError::TargetKind { .. } => "config_target_kind",
            ConfigurationError::MissingSource { .. } => "config_missing_source",
        }
    }
}

/// # Errors raised by user-supplied targets.
///
/// Never caught by a strategy: returning one ends the worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TargetError {
    /// Domain logic failed.
    #[error("target failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// A required keyword argument is absent.
    #[error("missing argument {key:?}")]
    MissingArgument {
        /// Argument name.
        key: String,
    },

    /// A keyword argument has the wrong shape.
    #[error("invalid argument {key:?}: {source}")]
    InvalidArgument {
        /// Argument name.
        key: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
}

impl TargetError {
    /// Shorthand for [`TargetError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TargetError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TargetError::Fail { .. } => "target_failed",
            TargetError::MissingArgument { .. } => "target_missing_argument",
            TargetError::InvalidArgument { .. } => "target_invalid_argument",
        }
    }
}

/// # Errors produced by queue backends.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum QueueError {
    /// Filesystem operation on a spool failed.
    #[error("queue I/O on {path:?}: {source}")]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backend does not support the requested operation.
    #[error("queue backend {backend} does not support {operation}")]
    Unsupported {
        /// Backend name.
        backend: &'static str,
        /// Operation name.
        operation: &'static str,
    },
}

impl QueueError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QueueError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Io { .. } => "queue_io",
            QueueError::Unsupported { .. } => "queue_unsupported",
        }
    }
}

/// # Everything that ends a worker process with a failure status.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Topology could not be loaded inside the worker.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Worker definition refers to something unregistered.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// User target failed.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Queue backend failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Signal handlers could not be installed.
    #[error("cannot install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Topology(e) => e.as_label(),
            WorkerError::Configuration(e) => e.as_label(),
            WorkerError::Target(e) => e.as_label(),
            WorkerError::Queue(e) => e.as_label(),
            WorkerError::Signal(_) => "worker_signal",
        }
    }
}

/// # Errors produced by the supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Topology could not be loaded at startup.
    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Topology failed eager validation at startup.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Shutdown grace period was exceeded; the listed workers had to be killed.
    #[error("shutdown timeout {grace:?} exceeded; killed: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the workers that did not exit in time.
        stuck: Vec<String>,
    },

    /// A worker process could not be started.
    #[error("cannot spawn worker {worker:?}: {source}")]
    Spawn {
        /// Worker name.
        worker: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A signal could not be delivered or handlers could not be installed.
    #[error("signal handling failed: {0}")]
    Signal(#[source] std::io::Error),

    /// The supervisor cannot locate its own executable to launch workers with.
    #[error("cannot locate the worker executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use topovisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Topology(e) => e.as_label(),
            RuntimeError::Configuration(e) => e.as_label(),
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Spawn { .. } => "runtime_spawn",
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::CurrentExe(_) => "runtime_current_exe",
        }
    }
}
