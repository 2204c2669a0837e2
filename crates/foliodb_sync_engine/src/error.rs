//! Error types for the sync engine.

use foliodb_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during replication.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Invalid or undecodable protocol message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected the client's credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// Local store error while applying or collecting operations.
    #[error("store error: {0}")]
    Store(#[from] foliodb_core::StoreError),

    /// A one-shot sync was requested while one is already running.
    #[error("a sync is already in progress")]
    SyncInFlight,

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// The transport is not connected.
    #[error("not connected to server")]
    NotConnected,

    /// Client and server speak different protocol versions.
    #[error("protocol version mismatch: local={local}, remote={remote}")]
    VersionMismatch {
        /// Local protocol version.
        local: u16,
        /// Remote protocol version.
        remote: u16,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Timeout | Self::ServerError(_) => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
