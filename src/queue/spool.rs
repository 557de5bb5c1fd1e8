//! # Directory-backed queue.
//!
//! ```text
//! <dir>/tmp/<id>                       written by push, then renamed
//! <dir>/ready/<id>                     waiting for checkout
//! <dir>/inflight/<checked_out_ms>.<id> leased
//! ```
//!
//! Ids sort in push order, so checkout is FIFO per spool. Every state change is a
//! `rename(2)` within one directory tree, which makes it atomic and safe between
//! processes: when two workers race for the same entry, one rename fails with
//! `NotFound` and that worker moves on to the next entry.
//!
//! A leased entry whose holder died stays in `inflight/` until its visibility
//! timeout elapses; the next checkout by anyone moves it back to `ready/`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::fs;

use super::item::{Item, Lease, Source};
use crate::error::QueueError;

/// Spool queue rooted at one directory.
#[derive(Clone, Debug)]
pub struct Spool {
    ready: PathBuf,
    inflight: PathBuf,
    tmp: PathBuf,
    visibility: Duration,
}

impl Spool {
    /// Opens (creating if needed) the spool under `dir`.
    pub async fn open(dir: impl AsRef<Path>, visibility: Duration) -> Result<Self, QueueError> {
        let dir = dir.as_ref();
        let spool = Self {
            ready: dir.join("ready"),
            inflight: dir.join("inflight"),
            tmp: dir.join("tmp"),
            visibility,
        };
        for d in [&spool.ready, &spool.inflight, &spool.tmp] {
            fs::create_dir_all(d)
                .await
                .map_err(|e| QueueError::io(d, e))?;
        }
        Ok(spool)
    }

    /// Enqueues a payload and returns its id.
    pub async fn push(&self, body: impl Into<Vec<u8>>) -> Result<String, QueueError> {
        let id = format!("{:020}-{:08x}", now_nanos(), rand::random::<u32>());
        let staged = self.tmp.join(&id);
        fs::write(&staged, body.into())
            .await
            .map_err(|e| QueueError::io(&staged, e))?;
        let ready = self.ready.join(&id);
        fs::rename(&staged, &ready)
            .await
            .map_err(|e| QueueError::io(&ready, e))?;
        Ok(id)
    }

    /// Number of entries waiting for checkout.
    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(list(&self.ready).await?.len())
    }

    /// Number of leased entries.
    pub async fn inflight(&self) -> Result<usize, QueueError> {
        Ok(list(&self.inflight).await?.len())
    }

    /// Moves leases older than the visibility timeout back to `ready/`.
    ///
    /// Returns how many entries were redelivered.
    pub async fn requeue_expired(&self) -> Result<usize, QueueError> {
        let cutoff = now_millis().saturating_sub(self.visibility.as_millis());
        let mut moved = 0;
        for name in list(&self.inflight).await? {
            let Some((stamp, id)) = name.split_once('.') else {
                continue;
            };
            let Ok(stamp) = stamp.parse::<u128>() else {
                continue;
            };
            if stamp > cutoff {
                continue;
            }
            if claim(&self.inflight.join(&name), &self.ready.join(id)).await? {
                tracing::debug!(id, "redelivering expired lease");
                moved += 1;
            }
        }
        Ok(moved)
    }
}

#[async_trait]
impl Source for Spool {
    async fn checkout(&self) -> Result<Option<Box<dyn Lease>>, QueueError> {
        self.requeue_expired().await?;

        let mut names = list(&self.ready).await?;
        names.sort_unstable();
        for id in names {
            let path = self.inflight.join(format!("{}.{id}", now_millis()));
            if !claim(&self.ready.join(&id), &path).await? {
                continue;
            }
            let body = fs::read(&path)
                .await
                .map_err(|e| QueueError::io(&path, e))?;
            return Ok(Some(Box::new(SpoolLease {
                item: Item::new(id.clone(), body),
                path,
                ready: self.ready.join(id),
            })));
        }
        Ok(None)
    }
}

struct SpoolLease {
    item: Item,
    path: PathBuf,
    ready: PathBuf,
}

#[async_trait]
impl Lease for SpoolLease {
    fn item(&self) -> &Item {
        &self.item
    }

    async fn release(self: Box<Self>) -> Result<(), QueueError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            // Expired and redelivered meanwhile; the new holder owns it now.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QueueError::io(&self.path, e)),
        }
    }

    async fn nack(self: Box<Self>) -> Result<(), QueueError> {
        claim(&self.path, &self.ready).await.map(|_| ())
    }
}

/// Renames `from` to `to`; `Ok(false)` when someone else moved `from` first.
async fn claim(from: &Path, to: &Path) -> Result<bool, QueueError> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(QueueError::io(from, e)),
    }
}

async fn list(dir: &Path) -> Result<Vec<String>, QueueError> {
    let mut rd = fs::read_dir(dir)
        .await
        .map_err(|e| QueueError::io(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = rd.next_entry().await.map_err(|e| QueueError::io(dir, e))? {
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

fn now_millis() -> u128 {
    since_epoch().as_millis()
}

fn now_nanos() -> u128 {
    since_epoch().as_nanos()
}
