//! Targets shipped with the binary.
//!
//! | name      | kind   | arguments                         |
//! |-----------|--------|-----------------------------------|
//! | `log`     | map    | `level` (default `info`)          |
//! | `exec`    | map    | `command` (payload on stdin)      |
//! | `idle`    | custom |                                   |
//! | `command` | custom | `command` (SIGTERM when stopping) |

use std::process::Stdio;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::registry::{Targets, TargetsBuilder};
use super::target::{CustomTarget, MapTarget};
use crate::core::{ExitStatus, send_signal};
use crate::error::TargetError;
use crate::flag::ShutdownFlag;
use crate::queue::Item;
use crate::topology::Kwargs;

/// Registers every built-in target on `builder`.
pub fn register_builtin(builder: TargetsBuilder) -> TargetsBuilder {
    builder
        .map("log", LogItem)
        .map("exec", ExecItem)
        .custom("idle", Idle)
        .custom("command", RunCommand)
}

/// Table holding only the built-in targets.
pub fn builtin() -> Targets {
    register_builtin(Targets::builder()).build()
}

/// Writes each item to the log.
struct LogItem;

#[async_trait]
impl MapTarget for LogItem {
    async fn call(&self, item: &Item, kwargs: &Kwargs) -> Result<(), TargetError> {
        let level: String = kwargs.get_as("level")?.unwrap_or_else(|| "info".to_string());
        let id = item.id();
        let body = item.text().unwrap_or("<binary>");
        match level.as_str() {
            "trace" => tracing::trace!(id, body, "item"),
            "debug" => tracing::debug!(id, body, "item"),
            "info" => tracing::info!(id, body, "item"),
            "warn" => tracing::warn!(id, body, "item"),
            "error" => tracing::error!(id, body, "item"),
            other => return Err(TargetError::fail(format!("unknown log level {other:?}"))),
        }
        Ok(())
    }
}

/// Pipes each item into a shell command; a failed command fails the worker.
struct ExecItem;

#[async_trait]
impl MapTarget for ExecItem {
    async fn call(&self, item: &Item, kwargs: &Kwargs) -> Result<(), TargetError> {
        let command: String = kwargs.require("command")?;
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .env("TOPOVISOR_ITEM_ID", item.id())
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TargetError::fail(format!("cannot start {command:?}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores its input closes the pipe early; that is not a failure.
            let _ = stdin.write_all(item.body()).await;
        }
        let status = child
            .wait()
            .await
            .map_err(|e| TargetError::fail(format!("cannot wait for {command:?}: {e}")))?;
        finish(&command, ExitStatus::from(status))
    }
}

/// Does nothing until asked to stop.
struct Idle;

#[async_trait]
impl CustomTarget for Idle {
    async fn call(&self, event: ShutdownFlag, _kwargs: &Kwargs) -> Result<(), TargetError> {
        event.wait().await;
        Ok(())
    }
}

/// Runs one long-lived shell command, forwarding the stop request as SIGTERM.
struct RunCommand;

#[async_trait]
impl CustomTarget for RunCommand {
    async fn call(&self, event: ShutdownFlag, kwargs: &Kwargs) -> Result<(), TargetError> {
        let command: String = kwargs.require("command")?;
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TargetError::fail(format!("cannot start {command:?}: {e}")))?;

        tokio::select! {
            res = child.wait() => {
                let status = res
                    .map_err(|e| TargetError::fail(format!("cannot wait for {command:?}: {e}")))?;
                return finish(&command, ExitStatus::from(status));
            }
            _ = event.wait() => {}
        }

        if let Some(pid) = child.id() {
            if let Err(e) = send_signal(pid, Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "cannot forward stop to command");
            }
        }
        child
            .wait()
            .await
            .map_err(|e| TargetError::fail(format!("cannot wait for {command:?}: {e}")))?;
        Ok(())
    }
}

fn finish(command: &str, status: ExitStatus) -> Result<(), TargetError> {
    if status.success() {
        Ok(())
    } else {
        Err(TargetError::fail(format!("{command:?} ended with {status}")))
    }
}
