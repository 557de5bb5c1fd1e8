//! # OS signal handling.
//!
//! Supervisor (`forward_signals`):
//! - `SIGINT` / `SIGTERM` / `SIGQUIT` → [`Command::Stop`]
//! - `SIGUSR1` → [`Command::Reboot`]
//!
//! Worker process (`wait_for_stop_signal`): `SIGINT` / `SIGTERM` / `SIGQUIT` complete
//! the future; the bootstrap then sets the process's shutdown flag.
//!
//! Handlers are registered before the function returns, so a registration failure
//! surfaces as an error instead of a silently missing handler.

use std::future::Future;
use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::supervisor::Command;

struct StopSignals {
    int: Signal,
    term: Signal,
    quit: Signal,
}

impl StopSignals {
    fn install() -> io::Result<Self> {
        Ok(Self {
            int: signal(SignalKind::interrupt())?,
            term: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.int.recv() => "SIGINT",
            _ = self.term.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

/// Installs the stop signals and returns a future completing at the first one.
pub fn wait_for_stop_signal() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    let mut stop = StopSignals::install()?;
    Ok(async move {
        let name = stop.recv().await;
        tracing::info!(signal = name, "stop signal received");
    })
}

/// Spawns a task turning supervisor signals into commands on `tx`.
pub(crate) fn forward_signals(tx: mpsc::UnboundedSender<Command>) -> io::Result<JoinHandle<()>> {
    let mut stop = StopSignals::install()?;
    let mut reboot = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            let cmd = tokio::select! {
                name = stop.recv() => {
                    tracing::debug!(signal = name, "stop signal received");
                    Command::Stop
                }
                _ = reboot.recv() => Command::Reboot,
            };
            if tx.send(cmd).is_err() {
                break;
            }
        }
    }))
}
