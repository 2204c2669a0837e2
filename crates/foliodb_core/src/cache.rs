//! In-memory listing cache.
//!
//! Keeps the document listing warm for reactive callers. After an initial
//! [`ListingCache::reload`], the cache is kept current by feeding it
//! committed [`ChangeEvent`]s; each event touches only the document it
//! names, so unrelated entries are never re-fetched.

use crate::change_feed::{ChangeEvent, ChangeKind};
use crate::document::{Document, DocumentId};
use crate::error::StoreResult;
use crate::store::{self, Store};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A cache of the full document listing, keyed by document id.
///
/// Entries hold attachment stubs only.
#[derive(Default)]
pub struct ListingCache {
    docs: RwLock<HashMap<DocumentId, Document>>,
}

impl ListingCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cache contents with the store's current listing.
    ///
    /// Used for the initial fill and to recover after events were missed,
    /// e.g. when a subscriber reconnects.
    pub fn reload(&self, store: &Store) -> StoreResult<()> {
        let listing = store.all_docs()?;
        let mut docs = self.docs.write();
        docs.clear();
        for doc in listing {
            docs.insert(doc.id().clone(), doc);
        }
        Ok(())
    }

    /// Applies one committed change to the cached entry it names.
    pub fn apply(&self, event: &ChangeEvent) {
        let mut docs = self.docs.write();
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                if let Some(doc) = &event.doc {
                    docs.insert(event.id.clone(), doc.with_attachment_stubs());
                }
            }
            ChangeKind::Delete => {
                docs.remove(&event.id);
            }
        }
    }

    /// Returns the cached entry for `id`, if any.
    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.docs.read().get(id).cloned()
    }

    /// Returns the cached listing in display order: creation time, then id.
    pub fn docs(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.docs.read().values().cloned().collect();
        store::sort_listing(&mut docs);
        docs
    }

    /// Returns the number of cached documents.
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Returns true when the cache holds no documents.
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}
