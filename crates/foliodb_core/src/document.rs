//! Document and attachment model.

use crate::error::StoreError;
use crate::revision::Revision;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque unique key of a document.
///
/// Either caller-supplied (any non-empty string) or store-assigned
/// (a UUIDv4 string) at insert time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates an id from a caller-supplied string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocumentId`] for an empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(StoreError::InvalidDocumentId("empty id".into()));
        }
        Ok(Self(id))
    }

    /// Generates a fresh store-assigned id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A binary attachment, scoped to its parent document.
///
/// `data` is `None` for a stub: listings return stubs unless attachment
/// payloads were explicitly requested. `length` is always the payload
/// size, stub or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Declared content type, e.g. `image/png`.
    pub content_type: String,
    /// Binary payload. `None` when this is a stub.
    pub data: Option<Vec<u8>>,
    /// Payload size in bytes.
    pub length: u64,
}

impl Attachment {
    /// Creates an attachment with an inline payload.
    pub fn new(content_type: impl Into<String>, data: Vec<u8>) -> Self {
        let length = data.len() as u64;
        Self {
            content_type: content_type.into(),
            data: Some(data),
            length,
        }
    }

    /// Returns a stub copy without the payload.
    #[must_use]
    pub fn stub(&self) -> Self {
        Self {
            content_type: self.content_type.clone(),
            data: None,
            length: self.length,
        }
    }

    /// Returns true if the payload is present.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }
}

/// A document as stored and replicated.
///
/// Mutation is full-document replace: callers fetch, modify and write the
/// whole document back, echoing the revision from the read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    /// `None` only for documents not yet written to a store.
    rev: Option<Revision>,
    /// Title text.
    pub title: String,
    /// Description / content text.
    pub body: String,
    /// Creation timestamp, ISO-8601. Assigned at insert when empty.
    pub created_at: String,
    /// Attachments by name.
    pub attachments: BTreeMap<String, Attachment>,
}

impl Document {
    /// Creates a document with the given id and no revision.
    pub fn with_id(id: DocumentId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            rev: None,
            title: title.into(),
            body: body.into(),
            created_at: String::new(),
            attachments: BTreeMap::new(),
        }
    }

    /// Returns the document id.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Returns the current revision, if the document has been stored.
    #[must_use]
    pub fn rev(&self) -> Option<&Revision> {
        self.rev.as_ref()
    }

    /// Sets the revision. Used by the store after a committed write.
    pub(crate) fn set_rev(&mut self, rev: Revision) {
        self.rev = Some(rev);
    }

    /// Returns a copy carrying the given revision.
    ///
    /// Used by replication tooling when reconstructing documents from the
    /// wire; normal callers receive revisions from the store.
    #[must_use]
    pub fn with_rev(mut self, rev: Revision) -> Self {
        self.rev = Some(rev);
        self
    }

    /// Returns the attachment names in name order.
    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments.keys().cloned().collect()
    }

    /// Returns a copy with attachment payloads replaced by stubs.
    #[must_use]
    pub fn with_attachment_stubs(&self) -> Self {
        let mut doc = self.clone();
        for attachment in doc.attachments.values_mut() {
            *attachment = attachment.stub();
        }
        doc
    }

    /// Returns the named field used by search and indexing.
    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "body" => Some(&self.body),
            "created_at" => Some(&self.created_at),
            _ => None,
        }
    }
}

/// Input for inserting a new document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    /// Caller-supplied id, or `None` for a store-assigned one.
    pub id: Option<DocumentId>,
    /// Title text.
    pub title: String,
    /// Description / content text.
    pub body: String,
    /// Creation timestamp; assigned by the store when empty.
    pub created_at: String,
}

impl NewDocument {
    /// Creates an insert request with a store-assigned id.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            body: body.into(),
            created_at: String::new(),
        }
    }

    /// Sets a caller-supplied id.
    #[must_use]
    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets an explicit creation timestamp.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }
}
