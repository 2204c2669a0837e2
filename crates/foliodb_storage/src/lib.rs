//! # FolioDB Storage
//!
//! Append-only storage backends for FolioDB.
//!
//! Backends are opaque byte stores: they hold the journal bytes of a
//! document database without interpreting them. Record framing, checksums
//! and document encoding all live in `foliodb_core`.
//!
//! ## Available backends
//!
//! - [`InMemoryBackend`] - for tests and ephemeral databases
//! - [`FileBackend`] - persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use foliodb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
