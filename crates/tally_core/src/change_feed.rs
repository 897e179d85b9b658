//! Change feed for observing committed mutations.
//!
//! The store emits one event per committed mutation, enabling reactive
//! UI updates and audit hooks without coupling them to the write path.
//!
//! Delivery contract: at most once per mutation per subscriber. A
//! subscriber that has gone away is dropped; a slow or failing
//! subscriber never fails the mutation that triggered the event.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

/// Kind of committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A row was inserted (no previous version existed).
    Inserted,
    /// A row was updated in place.
    Updated,
    /// A row was marked deleted.
    Tombstoned,
}

/// A single change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Id of the affected transaction.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// What happened.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn inserted(id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            kind: ChangeKind::Inserted,
        }
    }

    /// Creates an update event.
    pub fn updated(id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            kind: ChangeKind::Updated,
        }
    }

    /// Creates a tombstone event.
    pub fn tombstoned(id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            kind: ChangeKind::Tombstoned,
        }
    }
}

/// Fan-out of committed mutations to subscribers.
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to future change events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all live subscribers.
    ///
    /// Disconnected subscribers are pruned; send failures are absorbed
    /// here so the caller's mutation result is unaffected.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let event = ChangeEvent::inserted(Uuid::new_v4(), "u1");
        feed.emit(event.clone());

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        let event = ChangeEvent::tombstoned(Uuid::new_v4(), "u1");
        feed.emit(event.clone());

        assert_eq!(rx1.recv().unwrap(), event);
        assert_eq!(rx2.recv().unwrap(), event);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        // Emission never fails even with a dead subscriber.
        feed.emit(ChangeEvent::updated(Uuid::new_v4(), "u1"));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
