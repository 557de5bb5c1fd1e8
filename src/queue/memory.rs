//! In-process queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::item::{Item, Lease, Source};
use crate::error::QueueError;

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Item>,
    next_id: u64,
    released: u64,
}

/// Queue held in memory; leases dropped without being settled go back to the front.
#[derive(Clone, Debug, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<State>>,
}

impl MemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue holding `items` in delivery order.
    pub fn from_items<I, B>(items: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        let q = Self::new();
        for body in items {
            q.push(body);
        }
        q
    }

    /// Appends an item and returns its id.
    pub fn push(&self, body: impl Into<Vec<u8>>) -> String {
        let mut st = self.lock();
        st.next_id += 1;
        let id = st.next_id.to_string();
        st.ready.push_back(Item::new(id.clone(), body));
        id
    }

    /// Number of items waiting for checkout.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    /// Returns `true` when nothing waits for checkout.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leases released so far.
    pub fn released(&self) -> u64 {
        self.lock().released
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent across a panic: every mutation is a single push or pop.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Source for MemoryQueue {
    async fn checkout(&self) -> Result<Option<Box<dyn Lease>>, QueueError> {
        let item = self.lock().ready.pop_front();
        Ok(item.map(|item| {
            Box::new(MemoryLease {
                queue: self.clone(),
                item,
                settled: false,
            }) as Box<dyn Lease>
        }))
    }
}

struct MemoryLease {
    queue: MemoryQueue,
    item: Item,
    settled: bool,
}

impl MemoryLease {
    fn give_back(&mut self) {
        if !std::mem::replace(&mut self.settled, true) {
            self.queue.lock().ready.push_front(self.item.clone());
        }
    }
}

#[async_trait]
impl Lease for MemoryLease {
    fn item(&self) -> &Item {
        &self.item
    }

    async fn release(mut self: Box<Self>) -> Result<(), QueueError> {
        if !std::mem::replace(&mut self.settled, true) {
            self.queue.lock().released += 1;
        }
        Ok(())
    }

    async fn nack(mut self: Box<Self>) -> Result<(), QueueError> {
        self.give_back();
        Ok(())
    }
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        self.give_back();
    }
}
