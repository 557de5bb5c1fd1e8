//! # LogWriter: events as `tracing` records
//!
//! Turns every supervisor [`Event`] into one structured `tracing` record, so each
//! worker exit produces exactly one log line in whatever sink the binary installed.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  topovisor: worker spawned worker="ingest" pid=4242 attempt=1
//! WARN  topovisor: worker exited worker="ingest" pid=4242 status=exit status 1
//! INFO  topovisor: worker queued worker="ingest" delay_ms=1000
//! ERROR topovisor: worker exhausted worker="ingest" reason="3 restarts within 60s"
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TopologyLoaded => info!(path = reason, "topology loaded"),
            EventKind::TopologyRejected => {
                error!(reason, "topology reload rejected, keeping previous topology")
            }
            EventKind::ShutdownRequested => warn!("shutdown requested"),
            EventKind::RebootRequested => warn!("reboot requested"),
            EventKind::AllStoppedWithin => info!("all workers stopped within grace"),
            EventKind::GraceExceeded => error!(stuck = reason, "grace exceeded"),
            EventKind::WorkerQueued => {
                debug!(worker, delay_ms = e.delay_ms.unwrap_or(0), "worker queued")
            }
            EventKind::WorkerSpawned => info!(
                worker,
                pid = e.pid.unwrap_or(0),
                attempt = e.attempt.unwrap_or(0),
                "worker spawned"
            ),
            EventKind::SpawnFailed => error!(worker, reason, "worker spawn failed"),
            EventKind::WorkerExited => {
                let pid = e.pid.unwrap_or(0);
                match e.status {
                    Some(status) if status.success() => {
                        info!(worker, pid, %status, "worker exited")
                    }
                    Some(status) => warn!(worker, pid, %status, "worker exited"),
                    None => warn!(worker, pid, "worker exited"),
                }
            }
            EventKind::WorkerTerminating => {
                info!(worker, pid = e.pid.unwrap_or(0), "terminating worker")
            }
            EventKind::WorkerKilled => warn!(worker, pid = e.pid.unwrap_or(0), "killed worker"),
            EventKind::WorkerExhausted => error!(worker, reason, "worker exhausted"),
            EventKind::SubscriberOverflow => warn!(subscriber = worker, reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => error!(subscriber = worker, reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
