//! Change feed for observing committed mutations.
//!
//! The feed emits one event per committed mutation, in commit order. It
//! drives the listing cache and the sync layer's pending-operation queue.

use crate::document::{Document, DocumentId};
use crate::revision::Revision;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Kind of change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Document was inserted (no previous version existed).
    Insert,
    /// Document was replaced (previous version existed).
    Update,
    /// Document was deleted.
    Delete,
}

/// A single committed change.
///
/// For inserts and updates, `doc` holds the new document with attachment
/// stubs; for deletes it is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Commit sequence number.
    pub sequence: u64,
    /// The changed document's id.
    pub id: DocumentId,
    /// The revision after the change (tombstone revision for deletes).
    pub revision: Revision,
    /// Kind of change.
    pub kind: ChangeKind,
    /// New document with attachment stubs, absent for deletes.
    pub doc: Option<Document>,
}

impl ChangeEvent {
    /// Creates an insert event.
    pub fn insert(sequence: u64, doc: Document) -> Self {
        Self {
            sequence,
            id: doc.id().clone(),
            revision: doc.rev().cloned().unwrap_or_else(|| Revision::new(0, "0")),
            kind: ChangeKind::Insert,
            doc: Some(doc),
        }
    }

    /// Creates an update event.
    pub fn update(sequence: u64, doc: Document) -> Self {
        Self {
            sequence,
            id: doc.id().clone(),
            revision: doc.rev().cloned().unwrap_or_else(|| Revision::new(0, "0")),
            kind: ChangeKind::Update,
            doc: Some(doc),
        }
    }

    /// Creates a delete event.
    pub fn delete(sequence: u64, id: DocumentId, revision: Revision) -> Self {
        Self {
            sequence,
            id,
            revision,
            kind: ChangeKind::Delete,
            doc: None,
        }
    }
}

/// Distributes committed changes to subscribers.
///
/// - emits only committed mutations, in commit order
/// - supports multiple subscribers
/// - retains bounded history for polling catch-up
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    history: RwLock<Vec<ChangeEvent>>,
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a change feed with the given history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Creates a change feed with the default history limit.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Subscribes to all future change events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to history and all live subscribers.
    pub fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            history.push(event.clone());
            if history.len() > self.max_history {
                let excess = history.len() - self.max_history;
                history.drain(0..excess);
            }
        }

        // Disconnected subscribers are dropped on the way.
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns retained events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the newest retained sequence, or 0.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|e| e.sequence).unwrap_or(0)
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

    fn doc(seq: u64) -> Document {
        let mut doc = Document::with_id(
            DocumentId::new(format!("doc-{seq}")).unwrap(),
            "title",
            "body",
        );
        doc.set_rev(Revision::first("abcd"));
        doc
    }

    #[test]
    fn emit_reaches_subscriber() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let event = ChangeEvent::insert(1, doc(1));
        feed.emit(event.clone());

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, event);
    }

    #[test]
    fn multiple_subscribers_all_receive() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.emit(ChangeEvent::insert(1, doc(1)));

        assert_eq!(rx1.recv().unwrap().sequence, 1);
        assert_eq!(rx2.recv().unwrap().sequence, 1);
    }

    #[test]
    fn dropped_subscribers_are_cleaned_up() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);
        feed.emit(ChangeEvent::insert(1, doc(1)));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn poll_from_cursor() {
        let feed = ChangeFeed::new();
        for seq in 1..=5 {
            feed.emit(ChangeEvent::insert(seq, doc(seq)));
        }

        let events = feed.poll(2, 10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence, 3);
    }

    #[test]
    fn history_is_bounded() {
        let feed = ChangeFeed::with_max_history(3);
        for seq in 1..=10 {
            feed.emit(ChangeEvent::insert(seq, doc(seq)));
        }

        let events = feed.poll(0, 100);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence, 8);
        assert_eq!(feed.latest_sequence(), 10);
    }
}
