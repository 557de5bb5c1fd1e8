//! # Per-worker status tracker with sequence-based ordering.
//!
//! Maintains an operator-facing view of where every worker currently is, using event
//! sequence numbers to reject out-of-order delivery.
//!
//! ```text
//! Supervisor ──► Bus ──► subscriber_listener() ──► StatusTracker::on_event()
//!                                                         │
//!                                                         ▼
//!                                         HashMap<String, (last_seq, WorkerStatus)>
//! ```
//!
//! ## Transitions
//! - `WorkerQueued`    → `Pending`
//! - `WorkerSpawned`   → `Running { pid }`
//! - `WorkerExited`    → `Stopped` (normally followed by `WorkerQueued`)
//! - `WorkerExhausted` → `Exhausted`
//! - other events only advance `last_seq`
//!
//! Reads are **eventually consistent** with the supervisor loop.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Where a worker currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// On the restart queue.
    Pending,
    /// A process is running for it.
    Running {
        /// Process id.
        pid: u32,
    },
    /// Its process was reaped and no respawn has been queued (yet).
    Stopped,
    /// The supervisor gave up on it.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    last_seq: u64,
    status: WorkerStatus,
}

/// Thread-safe tracker of per-worker status.
#[derive(Debug, Default)]
pub struct StatusTracker {
    state: RwLock<HashMap<String, Entry>>,
}

impl StatusTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event if it is newer than the last one seen for its worker.
    ///
    /// Returns `true` when the worker's status changed.
    pub async fn update(&self, ev: &Event) -> bool {
        if !ev.is_worker_event() {
            return false;
        }
        let Some(name) = ev.worker.as_deref() else {
            return false;
        };

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(Entry {
            last_seq: 0,
            status: WorkerStatus::Stopped,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;

        let next = match ev.kind {
            EventKind::WorkerQueued => WorkerStatus::Pending,
            EventKind::WorkerSpawned => match ev.pid {
                Some(pid) => WorkerStatus::Running { pid },
                None => return false,
            },
            EventKind::WorkerExited => WorkerStatus::Stopped,
            EventKind::WorkerExhausted => WorkerStatus::Exhausted,
            _ => return false,
        };
        let changed = entry.status != next;
        entry.status = next;
        changed
    }

    /// Returns the status of every worker seen so far, ordered by name.
    pub async fn snapshot(&self) -> BTreeMap<String, WorkerStatus> {
        self.state
            .read()
            .await
            .iter()
            .map(|(name, e)| (name.clone(), e.status))
            .collect()
    }

    /// Returns the status of one worker.
    pub async fn status(&self, name: &str) -> Option<WorkerStatus> {
        self.state.read().await.get(name).map(|e| e.status)
    }

    /// Returns sorted names of workers that currently have a process.
    pub async fn running(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .iter()
            .filter(|(_, e)| matches!(e.status, WorkerStatus::Running { .. }))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl Subscribe for StatusTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "status-tracker"
    }
}
