//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended beyond the end of the stored bytes.
    #[error("read past end: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested read offset.
        offset: u64,
        /// Requested read length.
        len: usize,
        /// Current backend size.
        size: u64,
    },

    /// A truncation target exceeded the current size.
    #[error("cannot truncate to {requested} bytes, current size is {size}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current backend size.
        size: u64,
    },

    /// The stored bytes are corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}
