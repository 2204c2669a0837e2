//! Error types for FolioDB core.

use crate::document::DocumentId;
use crate::revision::Revision;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
///
/// Every operation returns an explicit error kind so callers can decide
/// whether to retry, display or ignore a failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] foliodb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Document encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// No document with the given id exists.
    #[error("document not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: DocumentId,
    },

    /// Insert attempted with an id that already exists.
    #[error("document already exists: {id}")]
    DocumentExists {
        /// The conflicting id.
        id: DocumentId,
    },

    /// The supplied revision does not match the stored revision.
    #[error("revision conflict on {id}: current revision is {current}")]
    RevisionConflict {
        /// The document being written.
        id: DocumentId,
        /// The revision currently stored.
        current: Revision,
    },

    /// A revision token could not be parsed.
    #[error("invalid revision token: {0}")]
    InvalidRevision(String),

    /// A document id was empty or otherwise unusable.
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    /// A search pattern failed to compile.
    #[error("invalid query pattern: {0}")]
    InvalidQuery(String),

    /// No index with the given name exists.
    #[error("unknown index: {name}")]
    UnknownIndex {
        /// The requested index name.
        name: String,
    },

    /// The queried field is not part of the index definition.
    #[error("field {field} is not covered by index {index}")]
    FieldNotIndexed {
        /// Index name.
        index: String,
        /// Field name.
        field: String,
    },

    /// No attachment with the given name exists on the document.
    #[error("attachment not found: {name} on {id}")]
    AttachmentNotFound {
        /// Parent document id.
        id: DocumentId,
        /// Attachment name.
        name: String,
    },

    /// The journal is corrupted or has an invalid record.
    #[error("journal corruption: {0}")]
    JournalCorruption(String),

    /// Another process holds the database lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database directory is missing or malformed.
    #[error("invalid database: {0}")]
    InvalidDatabase(String),

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(message: impl Into<String>) -> Self {
        Self::JournalCorruption(message.into())
    }

    /// Creates an invalid database error.
    pub fn invalid_database(message: impl Into<String>) -> Self {
        Self::InvalidDatabase(message.into())
    }
}
