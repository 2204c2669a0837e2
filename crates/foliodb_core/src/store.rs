//! The document store facade.

use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::codec;
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::document::{Attachment, Document, DocumentId, NewDocument};
use crate::error::{StoreError, StoreResult};
use crate::index::{IndexDefinition, IndexEngine};
use crate::journal::{Journal, JournalRecord};
use crate::revision::{content_digest, Revision};
use crate::search::{self, SearchField};
use chrono::Utc;
use foliodb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;

/// Options for listing documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Whether attachment payloads are returned inline instead of stubs.
    pub include_attachment_data: bool,
}

impl ListOptions {
    /// Creates the default options: attachment stubs only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether attachment payloads are returned inline.
    #[must_use]
    pub const fn include_attachment_data(mut self, value: bool) -> Self {
        self.include_attachment_data = value;
        self
    }
}

/// Outcome of applying a replicated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The operation won and was committed.
    Applied,
    /// The local version was newer or equal; nothing changed.
    Ignored,
}

struct Inner {
    /// Live documents, attachments inline.
    docs: BTreeMap<DocumentId, Document>,
    /// Deleted ids and their tombstone revisions. Kept so a re-insert
    /// continues the generation chain and remote deletes stay idempotent.
    tombstones: HashMap<DocumentId, Revision>,
    next_seq: u64,
}

/// An open document database.
///
/// All methods take `&self`; the store is internally synchronized and can
/// be shared across threads behind an `Arc`. Durability comes from an
/// append-only journal replayed at open.
pub struct Store {
    // Holds the directory lock for on-disk stores.
    _dir: Option<DatabaseDir>,
    journal: Journal,
    inner: RwLock<Inner>,
    indexes: RwLock<IndexEngine>,
    feed: ChangeFeed,
    open: AtomicBool,
}

impl Store {
    /// Opens (or creates) a database at `path` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DatabaseLocked`] when another process holds
    /// the database, and [`StoreError::JournalCorruption`] when the
    /// journal has a damaged record before its tail.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database at `path` with the given configuration.
    pub fn open_with_config(path: &Path, config: Config) -> StoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        if config.error_if_exists && !dir.is_new_database() {
            return Err(StoreError::invalid_database(format!(
                "database already exists at {}",
                path.display()
            )));
        }

        let backend = FileBackend::open(&dir.journal_path())?;
        let store = Self::from_backend(Box::new(backend), Some(dir), &config)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(store)
    }

    /// Opens a transient in-memory database, mainly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_backend(Box::new(InMemoryBackend::new()), None, &Config::default())
    }

    fn from_backend(
        backend: Box<dyn StorageBackend>,
        dir: Option<DatabaseDir>,
        config: &Config,
    ) -> StoreResult<Self> {
        let journal = Journal::new(backend, config.sync_on_commit);

        let mut docs = BTreeMap::new();
        let mut tombstones = HashMap::new();
        let mut next_seq = 1;
        let records = journal.read_all()?;
        let replayed = records.len();
        for record in records {
            next_seq = record.seq() + 1;
            match record {
                JournalRecord::Put { doc, .. } => {
                    tombstones.remove(doc.id());
                    docs.insert(doc.id().clone(), doc);
                }
                JournalRecord::Delete { id, rev, .. } => {
                    docs.remove(&id);
                    tombstones.insert(id, rev);
                }
            }
        }
        if replayed > 0 {
            tracing::debug!(records = replayed, documents = docs.len(), "journal replayed");
        }

        Ok(Self {
            _dir: dir,
            journal,
            inner: RwLock::new(Inner {
                docs,
                tombstones,
                next_seq,
            }),
            indexes: RwLock::new(IndexEngine::new()),
            feed: ChangeFeed::with_max_history(config.change_history),
            open: AtomicBool::new(true),
        })
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::StoreClosed)
        }
    }

    /// Closes the store. Further operations fail with
    /// [`StoreError::StoreClosed`].
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Inserts a new document and returns it with its first revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentExists`] when a caller-supplied id is
    /// already live.
    pub fn insert(&self, new: NewDocument) -> StoreResult<Document> {
        self.ensure_open()?;
        let id = new.id.unwrap_or_else(DocumentId::generate);

        let mut inner = self.inner.write();
        if inner.docs.contains_key(&id) {
            return Err(StoreError::DocumentExists { id });
        }

        let mut doc = Document::with_id(id, new.title, new.body);
        doc.created_at = if new.created_at.is_empty() {
            Utc::now().to_rfc3339()
        } else {
            new.created_at
        };

        let digest = revision_digest(&doc)?;
        // A re-insert after delete continues the tombstone's generation so
        // replicated peers see it as newer than the delete.
        let rev = match inner.tombstones.get(doc.id()) {
            Some(tombstone) => Revision::new(tombstone.generation() + 1, digest),
            None => Revision::first(&digest),
        };
        doc.set_rev(rev);

        let seq = inner.next_seq;
        self.journal.append(&JournalRecord::Put {
            seq,
            doc: doc.clone(),
        })?;
        inner.next_seq += 1;
        inner.tombstones.remove(doc.id());
        inner.docs.insert(doc.id().clone(), doc.clone());
        self.indexes.write().apply_put(None, &doc);
        self.feed
            .emit(ChangeEvent::insert(seq, doc.with_attachment_stubs()));
        Ok(doc)
    }

    /// Fetches a document by id with attachment stubs.
    pub fn get(&self, id: &DocumentId) -> StoreResult<Document> {
        self.ensure_open()?;
        let inner = self.inner.read();
        inner
            .docs
            .get(id)
            .map(Document::with_attachment_stubs)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    /// Fetches a document by id with attachment payloads inline.
    pub fn get_with_attachments(&self, id: &DocumentId) -> StoreResult<Document> {
        self.ensure_open()?;
        let inner = self.inner.read();
        inner
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    /// Replaces a document.
    ///
    /// `doc.rev()` must echo the revision from the most recent read.
    /// Attachment stubs in `doc` are resolved against the stored payloads,
    /// so a document fetched with [`Store::get`] can be written back
    /// without re-supplying attachment bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RevisionConflict`] when the supplied revision
    /// is stale.
    pub fn update(&self, mut doc: Document) -> StoreResult<Document> {
        self.ensure_open()?;
        let supplied = doc
            .rev()
            .cloned()
            .ok_or_else(|| StoreError::InvalidRevision("update without a revision".into()))?;

        let mut inner = self.inner.write();
        let current = inner
            .docs
            .get(doc.id())
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                id: doc.id().clone(),
            })?;
        if current.rev() != Some(&supplied) {
            return Err(StoreError::RevisionConflict {
                id: doc.id().clone(),
                current: current.rev().cloned().unwrap_or_else(|| supplied.clone()),
            });
        }

        if doc.created_at.is_empty() {
            doc.created_at = current.created_at.clone();
        }
        let id = doc.id().clone();
        for (name, attachment) in &mut doc.attachments {
            if attachment.data.is_none() {
                let stored = current.attachments.get(name).and_then(|a| a.data.clone());
                match stored {
                    Some(data) => attachment.data = Some(data),
                    None => {
                        return Err(StoreError::AttachmentNotFound {
                            id: id.clone(),
                            name: name.clone(),
                        })
                    }
                }
            }
        }

        let digest = revision_digest(&doc)?;
        doc.set_rev(supplied.next(&digest));
        self.commit_put(&mut inner, Some(&current), doc)
    }

    /// Deletes a document. The supplied revision must be current.
    pub fn delete(&self, id: &DocumentId, rev: &Revision) -> StoreResult<()> {
        self.ensure_open()?;
        let mut inner = self.inner.write();
        let current = inner
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if current.rev() != Some(rev) {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                current: current.rev().cloned().unwrap_or_else(|| rev.clone()),
            });
        }

        let tombstone = rev.next(&content_digest(id.as_str().as_bytes()));
        let seq = inner.next_seq;
        self.journal.append(&JournalRecord::Delete {
            seq,
            id: id.clone(),
            rev: tombstone.clone(),
        })?;
        inner.next_seq += 1;
        inner.docs.remove(id);
        inner.tombstones.insert(id.clone(), tombstone.clone());
        self.indexes.write().apply_delete(&current);
        self.feed
            .emit(ChangeEvent::delete(seq, id.clone(), tombstone));
        Ok(())
    }

    /// Stores (or replaces) a named attachment and bumps the revision.
    ///
    /// Returns the document with its new revision.
    pub fn put_attachment(
        &self,
        id: &DocumentId,
        rev: &Revision,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StoreResult<Document> {
        self.ensure_open()?;
        let mut inner = self.inner.write();
        let current = inner
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if current.rev() != Some(rev) {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                current: current.rev().cloned().unwrap_or_else(|| rev.clone()),
            });
        }

        let mut doc = current.clone();
        doc.attachments
            .insert(name.to_string(), Attachment::new(content_type, data));
        let digest = revision_digest(&doc)?;
        doc.set_rev(rev.next(&digest));
        self.commit_put(&mut inner, Some(&current), doc)
    }

    /// Removes a named attachment and bumps the revision.
    pub fn delete_attachment(
        &self,
        id: &DocumentId,
        rev: &Revision,
        name: &str,
    ) -> StoreResult<Document> {
        self.ensure_open()?;
        let mut inner = self.inner.write();
        let current = inner
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        if current.rev() != Some(rev) {
            return Err(StoreError::RevisionConflict {
                id: id.clone(),
                current: current.rev().cloned().unwrap_or_else(|| rev.clone()),
            });
        }

        let mut doc = current.clone();
        if doc.attachments.remove(name).is_none() {
            return Err(StoreError::AttachmentNotFound {
                id: id.clone(),
                name: name.to_string(),
            });
        }
        let digest = revision_digest(&doc)?;
        doc.set_rev(rev.next(&digest));
        self.commit_put(&mut inner, Some(&current), doc)
    }

    /// Fetches a named attachment with its payload.
    pub fn get_attachment(&self, id: &DocumentId, name: &str) -> StoreResult<Attachment> {
        self.ensure_open()?;
        let inner = self.inner.read();
        let doc = inner
            .docs
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        doc.attachments
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::AttachmentNotFound {
                id: id.clone(),
                name: name.to_string(),
            })
    }

    /// Lists the attachment names of a document.
    pub fn attachment_names(&self, id: &DocumentId) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        let inner = self.inner.read();
        inner
            .docs
            .get(id)
            .map(Document::attachment_names)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })
    }

    /// Lists every live document with attachment stubs.
    ///
    /// Ordered by creation time, then id for a stable tiebreak.
    pub fn all_docs(&self) -> StoreResult<Vec<Document>> {
        self.all_docs_with_options(ListOptions::default())
    }

    /// Lists every live document with the given options.
    pub fn all_docs_with_options(&self, options: ListOptions) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let inner = self.inner.read();
        let mut docs: Vec<Document> = if options.include_attachment_data {
            inner.docs.values().cloned().collect()
        } else {
            inner.docs.values().map(Document::with_attachment_stubs).collect()
        };
        sort_listing(&mut docs);
        Ok(docs)
    }

    /// Filters documents by a case-insensitive pattern over one field.
    ///
    /// An empty pattern returns the full listing. Results carry attachment
    /// stubs and follow listing order.
    pub fn search(&self, field: SearchField, pattern: &str) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let inner = self.inner.read();
        let mut docs = search::filter(inner.docs.values(), field, pattern)?;
        for doc in &mut docs {
            *doc = doc.with_attachment_stubs();
        }
        sort_listing(&mut docs);
        Ok(docs)
    }

    /// Creates a named index over `fields`, idempotently.
    ///
    /// Returns `true` when the index was (re)built, `false` when an
    /// identical definition already existed.
    pub fn create_index(
        &self,
        name: impl Into<String>,
        fields: Vec<String>,
    ) -> StoreResult<bool> {
        self.ensure_open()?;
        let inner = self.inner.read();
        Ok(self
            .indexes
            .write()
            .create(name, fields, inner.docs.values()))
    }

    /// Exact-match query against a named index.
    ///
    /// Results carry attachment stubs, in id order.
    pub fn query_index(
        &self,
        name: &str,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Document>> {
        self.ensure_open()?;
        let inner = self.inner.read();
        let ids = self.indexes.read().query(name, field, value)?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.docs.get(id))
            .map(Document::with_attachment_stubs)
            .collect())
    }

    /// Returns the current index definitions.
    pub fn index_definitions(&self) -> Vec<IndexDefinition> {
        self.indexes.read().definitions()
    }

    /// Subscribes to committed changes.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Returns up to `limit` changes committed after sequence `since`.
    pub fn changes_since(&self, since: u64, limit: usize) -> Vec<ChangeEvent> {
        self.feed.poll(since, limit)
    }

    /// Returns the most recent committed sequence number.
    pub fn latest_sequence(&self) -> u64 {
        self.inner.read().next_seq - 1
    }

    /// Applies a replicated put, keeping whichever revision orders higher.
    pub fn apply_remote(&self, doc: Document) -> StoreResult<RemoteOutcome> {
        self.ensure_open()?;
        let remote_rev = doc
            .rev()
            .cloned()
            .ok_or_else(|| StoreError::InvalidRevision("replicated put without a revision".into()))?;

        let mut inner = self.inner.write();
        let current = inner.docs.get(doc.id()).cloned();
        let superseded = match &current {
            Some(local) => local.rev().is_some_and(|r| *r >= remote_rev),
            None => inner
                .tombstones
                .get(doc.id())
                .is_some_and(|t| *t >= remote_rev),
        };
        if superseded {
            return Ok(RemoteOutcome::Ignored);
        }

        self.commit_put(&mut inner, current.as_ref(), doc)?;
        Ok(RemoteOutcome::Applied)
    }

    /// Applies a replicated delete, keeping whichever revision orders higher.
    pub fn apply_remote_delete(
        &self,
        id: &DocumentId,
        rev: &Revision,
    ) -> StoreResult<RemoteOutcome> {
        self.ensure_open()?;
        let mut inner = self.inner.write();

        if let Some(current) = inner.docs.get(id).cloned() {
            if current.rev().is_some_and(|r| *r >= *rev) {
                return Ok(RemoteOutcome::Ignored);
            }
            let seq = inner.next_seq;
            self.journal.append(&JournalRecord::Delete {
                seq,
                id: id.clone(),
                rev: rev.clone(),
            })?;
            inner.next_seq += 1;
            inner.docs.remove(id);
            inner.tombstones.insert(id.clone(), rev.clone());
            self.indexes.write().apply_delete(&current);
            self.feed
                .emit(ChangeEvent::delete(seq, id.clone(), rev.clone()));
            return Ok(RemoteOutcome::Applied);
        }

        // No live document: record the tombstone if it is news to us.
        if inner.tombstones.get(id).is_some_and(|t| *t >= *rev) {
            return Ok(RemoteOutcome::Ignored);
        }
        let seq = inner.next_seq;
        self.journal.append(&JournalRecord::Delete {
            seq,
            id: id.clone(),
            rev: rev.clone(),
        })?;
        inner.next_seq += 1;
        inner.tombstones.insert(id.clone(), rev.clone());
        Ok(RemoteOutcome::Applied)
    }

    /// Rewrites the journal down to one record per live document and
    /// tombstone, discarding superseded history.
    pub fn compact(&self) -> StoreResult<()> {
        self.ensure_open()?;
        let inner = self.inner.write();

        let total = inner.docs.len() + inner.tombstones.len();
        // Number the surviving records so the journal still ends at the
        // current sequence and replay resumes where we left off.
        let mut seq = (inner.next_seq - 1).saturating_sub(total as u64);
        let mut records = Vec::with_capacity(total);
        let mut tombstones: Vec<_> = inner.tombstones.iter().collect();
        tombstones.sort_by(|a, b| a.0.cmp(b.0));
        for (id, rev) in tombstones {
            seq += 1;
            records.push(JournalRecord::Delete {
                seq,
                id: id.clone(),
                rev: rev.clone(),
            });
        }
        for doc in inner.docs.values() {
            seq += 1;
            records.push(JournalRecord::Put {
                seq,
                doc: doc.clone(),
            });
        }

        self.journal.rewrite(&records)?;
        tracing::debug!(records = records.len(), "journal compacted");
        Ok(())
    }

    /// Commits a put that has already passed validation, with `old` the
    /// previous version if any. Caller holds the write lock.
    fn commit_put(
        &self,
        inner: &mut Inner,
        old: Option<&Document>,
        doc: Document,
    ) -> StoreResult<Document> {
        let seq = inner.next_seq;
        self.journal.append(&JournalRecord::Put {
            seq,
            doc: doc.clone(),
        })?;
        inner.next_seq += 1;
        inner.tombstones.remove(doc.id());
        inner.docs.insert(doc.id().clone(), doc.clone());
        self.indexes.write().apply_put(old, &doc);
        let event = if old.is_some() {
            ChangeEvent::update(seq, doc.with_attachment_stubs())
        } else {
            ChangeEvent::insert(seq, doc.with_attachment_stubs())
        };
        self.feed.emit(event);
        Ok(doc)
    }
}

/// Stable listing order: creation time, then id.
pub(crate) fn sort_listing(docs: &mut [Document]) {
    docs.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Digest over the document's content, excluding its revision, so equal
/// content yields equal digests on every replica.
fn revision_digest(doc: &Document) -> StoreResult<String> {
    let bytes = codec::to_cbor(&(
        &doc.title,
        &doc.body,
        &doc.created_at,
        &doc.attachments,
    ))?;
    Ok(content_digest(&bytes))
}
