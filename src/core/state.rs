//! # Restart queue and child table.
//!
//! Both structures are owned by the supervisor loop and mutated only from it, so
//! every operation is a plain method call: no locks, no interleaving.
//!
//! - [`RestartQueue`] names waiting for a process, each with an earliest-spawn instant.
//!   Draining never blocks; names whose backoff has not elapsed stay queued in order.
//! - [`ChildTable`] live pid → worker name, start instant and a control channel to the
//!   watcher task that owns the process.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

/// Request sent to a child's watcher task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    /// Send SIGTERM.
    Terminate,
    /// Send SIGKILL.
    Kill,
}

#[derive(Debug)]
struct Pending {
    name: Arc<str>,
    ready_at: Instant,
}

/// Names awaiting a new process.
#[derive(Debug, Default)]
pub(crate) struct RestartQueue {
    entries: VecDeque<Pending>,
}

impl RestartQueue {
    pub fn push(&mut self, name: Arc<str>, ready_at: Instant) {
        self.entries.push_back(Pending { name, ready_at });
    }

    /// Removes and returns, in queue order, every name whose backoff has elapsed.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<Arc<str>> {
        let mut ready = Vec::new();
        self.entries.retain(|p| {
            if p.ready_at <= now {
                ready.push(Arc::clone(&p.name));
                false
            } else {
                true
            }
        });
        ready
    }

    /// Earliest instant at which a queued name becomes spawnable.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|p| p.ready_at).min()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|p| &*p.name == name)
    }
}

#[derive(Debug)]
pub(crate) struct Running {
    pub name: Arc<str>,
    pub started: Instant,
    control: mpsc::UnboundedSender<Control>,
}

impl Running {
    pub fn new(name: Arc<str>, started: Instant, control: mpsc::UnboundedSender<Control>) -> Self {
        Self {
            name,
            started,
            control,
        }
    }

    /// Forwards `ctl` to the watcher; `false` when the watcher has already finished.
    pub fn send(&self, ctl: Control) -> bool {
        self.control.send(ctl).is_ok()
    }
}

/// Live children keyed by pid.
#[derive(Debug, Default)]
pub(crate) struct ChildTable {
    by_pid: HashMap<u32, Running>,
}

impl ChildTable {
    pub fn insert(&mut self, pid: u32, child: Running) {
        self.by_pid.insert(pid, child);
    }

    pub fn remove(&mut self, pid: u32) -> Option<Running> {
        self.by_pid.remove(&pid)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_pid.values().any(|c| &*c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Running)> {
        self.by_pid.iter().map(|(pid, c)| (*pid, c))
    }

    /// Sorted names of live children.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_pid.values().map(|c| c.name.to_string()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }
}
