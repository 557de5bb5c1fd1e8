//! # Runtime events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker lifecycle**: queued, spawned, exited, terminated, killed, exhausted
//! - **Supervisor lifecycle**: topology loaded, shutdown, reboot, grace outcome
//! - **Subscriber health**: overflow, panic
//!
//! The [`Event`] struct carries additional metadata such as timestamps, worker name,
//! process id, exit status, reasons and respawn delays.
//!
//! ## Ordering
//! `seq` comes from one process-wide counter, so it orders events even when
//! subscribers see them out of order (the [`StatusTracker`](crate::StatusTracker)
//! relies on this).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use topovisor::{Event, EventKind, ExitStatus};
//!
//! let ev = Event::new(EventKind::WorkerExited)
//!     .with_worker("ingest")
//!     .with_pid(4242)
//!     .with_status(ExitStatus::Exited(1));
//!
//! assert_eq!(ev.kind, EventKind::WorkerExited);
//! assert_eq!(ev.worker.as_deref(), Some("ingest"));
//! assert_eq!(ev.pid, Some(4242));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::ExitStatus;

/// Next `seq`.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// What an [`Event`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // subscribers
    /// A subscriber's `on_event` panicked.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// An event was dropped for one subscriber.
    ///
    /// Sets:
    /// - `worker`: subscriber name
    /// - `reason`: `full` or `closed`, with the subscriber name
    SubscriberOverflow,

    // supervisor
    /// Topology loaded and validated; the restart queue has been seeded from it.
    ///
    /// Sets:
    /// - `reason`: topology path
    TopologyLoaded,

    /// Reloading the topology on reboot failed; the previous one stays in effect.
    ///
    /// Sets:
    /// - `reason`: error message
    TopologyRejected,

    /// Stop requested (SIGINT/SIGTERM/SIGQUIT or handle).
    ShutdownRequested,

    /// Reboot requested (SIGUSR1 or handle).
    RebootRequested,

    /// All workers exited within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; the remaining workers are being killed.
    ///
    /// Sets:
    /// - `reason`: names of the stuck workers
    GraceExceeded,

    // workers
    /// Worker placed on the restart queue (seed or respawn).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `delay_ms`: earliest spawn, relative to now (ms)
    WorkerQueued,

    /// A process was started for the worker.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: process id
    /// - `attempt`: spawn count for this worker (1-based, per supervisor generation)
    WorkerSpawned,

    /// Starting a process for the worker failed.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: error message
    SpawnFailed,

    /// A worker process terminated and has been reaped.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: process id
    /// - `status`: exit status
    WorkerExited,

    /// The supervisor asked a worker process to terminate (SIGTERM).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: process id
    WorkerTerminating,

    /// The supervisor force-killed a worker process (SIGKILL).
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `pid`: process id
    WorkerKilled,

    /// The restart policy or restart limit gave up on the worker.
    ///
    /// Sets:
    /// - `worker`: worker name
    /// - `reason`: why the worker will not be respawned
    WorkerExhausted,
}

/// One supervisor event. Which optional fields are set depends on [`EventKind`].
#[derive(Clone, Debug)]
pub struct Event {
    /// Process-wide ordering key.
    pub seq: u64,
    /// When the event was created.
    pub at: SystemTime,
    /// What happened.
    pub kind: EventKind,
    /// Name of the worker, if applicable.
    pub worker: Option<Arc<str>>,
    /// OS process id, if applicable.
    pub pid: Option<u32>,
    /// Exit status of a reaped process.
    pub status: Option<ExitStatus>,
    /// Spawn count (starting from 1).
    pub attempt: Option<u32>,
    /// Respawn delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Error text, stuck workers, overflow details.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Stamps a new event with the next `seq` and the current time.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            status: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an exit status.
    #[inline]
    pub fn with_status(mut self, status: ExitStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches a spawn count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a respawn delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// `SubscriberOverflow` for `subscriber`.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// `SubscriberPanicked` for `subscriber`.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for events that describe one worker's lifecycle.
    #[inline]
    pub fn is_worker_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::WorkerQueued
                | EventKind::WorkerSpawned
                | EventKind::SpawnFailed
                | EventKind::WorkerExited
                | EventKind::WorkerTerminating
                | EventKind::WorkerKilled
                | EventKind::WorkerExhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::WorkerQueued);
        let b = Event::new(EventKind::WorkerQueued);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_saturates_at_u32() {
        let ev = Event::new(EventKind::WorkerQueued).with_delay(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
