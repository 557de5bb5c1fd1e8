//! # Starting and signalling worker processes.
//!
//! The supervisor never touches `tokio::process` directly. It asks a [`Launcher`]
//! for a [`WorkerProcess`] and hands that to a per-child watcher task, which is the
//! only owner of the process from then on:
//!
//! ```text
//! Supervisor ──launch(name, topology)──► Launcher ──► Box<dyn WorkerProcess>
//!                                                        │
//!                                      watcher task: select { wait(), Terminate, Kill }
//!                                                        │
//!                                      Exit { pid, name, status } ──► Supervisor
//! ```
//!
//! [`ProcessLauncher`] runs `topovisor worker --config <path> --name <name>` (or any
//! other program given the same trailing arguments).

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::error::RuntimeError;

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited with a status code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(i32),
    /// The status could not be collected.
    Unknown,
}

impl ExitStatus {
    /// Returns `true` for exit code 0.
    #[inline]
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    /// Exit code, if the process exited on its own.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit status {code}"),
            ExitStatus::Signaled(sig) => match Signal::try_from(*sig) {
                Ok(name) => write!(f, "killed by {name}"),
                Err(_) => write!(f, "killed by signal {sig}"),
            },
            ExitStatus::Unknown => f.write_str("unknown status"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ExitStatus::Exited(code),
            (None, Some(sig)) => ExitStatus::Signaled(sig),
            (None, None) => ExitStatus::Unknown,
        }
    }
}

/// A started worker process, owned by exactly one watcher task.
#[async_trait]
pub trait WorkerProcess: Send + 'static {
    /// OS process id.
    fn pid(&self) -> u32;

    /// Asks the process to stop (SIGTERM).
    fn terminate(&mut self) -> io::Result<()>;

    /// Kills the process (SIGKILL).
    fn kill(&mut self) -> io::Result<()>;

    /// Waits for the process to end and reaps it. Cancel safe.
    async fn wait(&mut self) -> ExitStatus;
}

/// Starts worker processes.
pub trait Launcher: Send + Sync + 'static {
    /// Starts a process that boots `worker` from the topology at `topology`.
    fn launch(&self, worker: &str, topology: &Path) -> Result<Box<dyn WorkerProcess>, RuntimeError>;
}

/// [`Launcher`] backed by a real executable.
///
/// The command line is `<program> <args...> --config <topology> --name <worker>`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ProcessLauncher {
    /// Launches `program` with no leading arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Launches the running executable's `worker` subcommand.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }

    /// Appends a leading argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, worker: &str, topology: &Path) -> Result<Box<dyn WorkerProcess>, RuntimeError> {
        let spawn_err = |source| RuntimeError::Spawn {
            worker: worker.to_string(),
            source,
        };
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg("--config")
            .arg(topology)
            .arg("--name")
            .arg(worker)
            .stdin(Stdio::null())
            .spawn()
            .map_err(spawn_err)?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_err(io::Error::other("process exited before it was tracked")))?;
        Ok(Box::new(ChildProcess { pid, child }))
    }
}

struct ChildProcess {
    pid: u32,
    child: Child,
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn terminate(&mut self) -> io::Result<()> {
        send_signal(self.pid, Signal::SIGTERM)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    async fn wait(&mut self) -> ExitStatus {
        match self.child.wait().await {
            Ok(status) => status.into(),
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "cannot collect exit status");
                ExitStatus::Unknown
            }
        }
    }
}

/// Sends `signal` to process `pid`.
pub(crate) fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    let raw = i32::try_from(pid).map_err(io::Error::other)?;
    kill(Pid::from_raw(raw), signal).map_err(io::Error::from)
}
