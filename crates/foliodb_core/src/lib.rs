//! # FolioDB Core
//!
//! Embedded document store for FolioDB.
//!
//! This crate provides:
//! - Document CRUD with optimistic concurrency (revision tokens)
//! - Inline binary attachments
//! - Full listing and case-insensitive pattern search
//! - Named secondary indexes
//! - A change feed for reactive callers and the sync layer
//! - An append-only journal for durability
//!
//! ## Opening a store
//!
//! ```rust,ignore
//! use foliodb_core::{Store, NewDocument};
//!
//! let store = Store::open(Path::new("my_docs"))?;
//! let doc = store.insert(NewDocument::new("Title", "Body"))?;
//! let fetched = store.get(doc.id())?;
//! ```
//!
//! Every mutation requires the revision token from the most recent read;
//! a stale token is rejected with [`StoreError::RevisionConflict`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod change_feed;
mod codec;
mod config;
mod dir;
mod document;
mod error;
mod images;
mod index;
mod journal;
mod revision;
mod search;
mod store;

pub use cache::ListingCache;
pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use codec::{decode_document, encode_document};
pub use config::Config;
pub use document::{Attachment, Document, DocumentId, NewDocument};
pub use error::{StoreError, StoreResult};
pub use images::{is_image_name, ImageHandle, ImageLoader};
pub use index::{IndexDefinition, IndexEngine};
pub use journal::JournalRecord;
pub use revision::Revision;
pub use search::SearchField;
pub use store::{ListOptions, RemoteOutcome, Store};
