//! Supervisor core: process launching, restart bookkeeping and the control loop.
//!
//! Internal modules:
//! - [`launcher`]: starts worker processes and reports how they ended;
//! - [`state`]: restart queue and child table;
//! - [`supervisor`]: the control loop, stop and reboot;
//! - [`shutdown`]: OS signal handling for supervisor and workers;
//! - [`config`]: the topology's `supervisor` section;
//! - [`builder`]: eager validation and wiring.

mod builder;
mod config;
mod launcher;
mod shutdown;
mod state;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use launcher::{ExitStatus, Launcher, ProcessLauncher, WorkerProcess};
pub(crate) use launcher::send_signal;
pub use shutdown::wait_for_stop_signal;
pub use supervisor::{Supervisor, SupervisorHandle};
