//! # Work queues feeding `map` workers.
//!
//! A queue hands out items as **leases**: a checkout moves the item out of the
//! ready set, and the holder must either [`release`](Lease::release) it (done) or
//! [`nack`](Lease::nack) it (put it back). A lease that is neither released nor
//! nacked, because the holding process died, is recovered by the backend: the
//! memory queue requeues it on drop, the spool redelivers it once its visibility
//! timeout elapses.
//!
//! ## Backends
//! - [`MemoryQueue`] in-process, for tests and embedding.
//! - [`Spool`] a directory per queue on the local disk; safe to share between
//!   processes because every state change is an atomic rename.
//!
//! ## Topology
//! ```yaml
//! user_ids: &user_ids
//!   kind: spool
//!   dir: /var/spool/topovisor/user_ids
//!   visibility: 5m
//! ```

mod item;
mod memory;
mod spool;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

pub use item::{Item, Lease, Source, SourceRef};
pub use memory::MemoryQueue;
pub use spool::Spool;

use crate::error::QueueError;

/// Queue description as written in a topology file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum QueueConfig {
    /// Directory-backed queue shared between processes.
    Spool {
        /// Root directory; `ready/`, `inflight/` and `tmp/` are created under it.
        dir: PathBuf,
        /// How long a checked-out item may stay unreleased before redelivery.
        #[serde(
            default = "default_visibility",
            deserialize_with = "crate::durations::deserialize"
        )]
        visibility: Duration,
    },
    /// Process-local queue seeded with fixed items.
    Memory {
        /// Initial items, in delivery order.
        #[serde(default)]
        items: Vec<String>,
    },
}

fn default_visibility() -> Duration {
    Duration::from_secs(300)
}

impl QueueConfig {
    /// Opens the described queue.
    pub async fn open(&self) -> Result<SourceRef, QueueError> {
        match self {
            QueueConfig::Spool { dir, visibility } => {
                Ok(Arc::new(Spool::open(dir, *visibility).await?))
            }
            QueueConfig::Memory { items } => Ok(Arc::new(MemoryQueue::from_items(
                items.iter().map(|s| s.as_bytes().to_vec()),
            ))),
        }
    }

    /// Enqueues a payload; only spool queues outlive the process that writes to them.
    pub async fn push(&self, body: impl Into<Vec<u8>>) -> Result<String, QueueError> {
        match self {
            QueueConfig::Spool { dir, visibility } => {
                Spool::open(dir, *visibility).await?.push(body).await
            }
            QueueConfig::Memory { .. } => Err(QueueError::Unsupported {
                backend: "memory",
                operation: "push from outside the worker",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spool_with_default_visibility() {
        let cfg: QueueConfig = serde_yaml::from_str("kind: spool\ndir: /tmp/q").unwrap();
        assert_eq!(
            cfg,
            QueueConfig::Spool {
                dir: PathBuf::from("/tmp/q"),
                visibility: Duration::from_secs(300),
            }
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(serde_yaml::from_str::<QueueConfig>("kind: redis\nhost: x").is_err());
    }

    #[tokio::test]
    async fn memory_config_delivers_items_in_order() {
        let cfg: QueueConfig = serde_yaml::from_str("kind: memory\nitems: [a, b]").unwrap();
        let q = cfg.open().await.unwrap();
        let first = q.checkout().await.unwrap().unwrap();
        assert_eq!(first.item().body(), b"a");
        first.release().await.unwrap();
        let second = q.checkout().await.unwrap().unwrap();
        assert_eq!(second.item().body(), b"b");
        assert!(cfg.push("x").await.is_err());
    }
}
