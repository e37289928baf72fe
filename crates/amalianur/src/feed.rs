//! Row-level change feeds.
//!
//! Every table that the public form or the admin console watches owns a
//! [`ChangeFeed`]. The store publishes while it still holds the table lock, so
//! subscribers see events in commit order. A [`Subscription`] detaches when it is
//! dropped.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

/// Insert/update/delete notification for a single row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "row", rename_all = "UPPERCASE")]
pub enum ChangeEvent<T> {
    Insert(T),
    Update(T),
    Delete { id: String },
}

impl<T> ChangeEvent<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert(_) => "insert",
            ChangeEvent::Update(_) => "update",
            ChangeEvent::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug)]
pub struct ChangeFeed<T> {
    table: &'static str,
    sender: broadcast::Sender<ChangeEvent<T>>,
}

impl<T> ChangeFeed<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(table: &'static str) -> Self {
        Self::with_capacity(table, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(table: &'static str, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { table, sender }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Fan an event out to every attached subscriber. Having none is not an error.
    pub fn publish(&self, event: ChangeEvent<T>) {
        let kind = event.kind();
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(table = self.table, kind, delivered, "change published");
    }

    pub fn subscribe(&self) -> Subscription<T> {
        debug!(table = self.table, "subscriber attached");
        Subscription {
            table: self.table,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Live handle on a [`ChangeFeed`].
#[derive(Debug)]
pub struct Subscription<T> {
    table: &'static str,
    receiver: broadcast::Receiver<ChangeEvent<T>>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + 'static,
{
    pub fn table(&self) -> &'static str {
        self.table
    }

    /// Wait for the next event. `None` once the feed itself is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent<T>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(table = self.table, skipped, "subscriber lagged behind feed");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by session objects that drain between actions.
    pub fn try_next(&mut self) -> Option<ChangeEvent<T>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(table = self.table, skipped, "subscriber lagged behind feed");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn drain(&mut self) -> Vec<ChangeEvent<T>> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        debug!(table = self.table, "subscriber detached");
    }
}
