//! Queue items, leases and the [`Source`] contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::QueueError;

/// One unit of work as stored in a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: String,
    body: Vec<u8>,
}

impl Item {
    /// Creates an item.
    pub fn new(id: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    /// Backend-assigned identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw payload.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Payload as UTF-8, if it is.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Decodes the payload as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A checked-out item the holder must settle.
///
/// Dropping a lease without settling it leaves recovery to the backend.
#[async_trait]
pub trait Lease: Send {
    /// The leased item.
    fn item(&self) -> &Item;

    /// Marks the item done; it will not be delivered again.
    async fn release(self: Box<Self>) -> Result<(), QueueError>;

    /// Gives the item back for redelivery.
    async fn nack(self: Box<Self>) -> Result<(), QueueError>;
}

/// Non-blocking checkout side of a queue.
#[async_trait]
pub trait Source: Send + Sync + 'static {
    /// Takes the next item, or `None` when nothing is ready right now. Never waits for work.
    async fn checkout(&self) -> Result<Option<Box<dyn Lease>>, QueueError>;
}

/// Shared handle to a queue.
pub type SourceRef = Arc<dyn Source>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_decodes() {
        let item = Item::new("1", br#"{"user": 42}"#.to_vec());
        let v: serde_json::Value = item.json().unwrap();
        assert_eq!(v["user"], 42);
        assert_eq!(item.text(), Some(r#"{"user": 42}"#));
    }
}
