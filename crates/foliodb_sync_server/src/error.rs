//! Error types for the sync server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request body or parameters were malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The presented token failed validation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The requested endpoint does not exist.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The client speaks an incompatible protocol revision.
    #[error("protocol version mismatch: client sent {0}")]
    ProtocolMismatch(u16),

    /// The server's authoritative store failed.
    #[error("store error: {0}")]
    Store(#[from] foliodb_core::StoreError),

    /// Wire-level encode or decode failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] foliodb_sync_protocol::ProtocolError),
}

impl ServerError {
    /// True when the failure was caused by the client's request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_)
                | ServerError::NotAuthorized(_)
                | ServerError::UnknownEndpoint(_)
                | ServerError::ProtocolMismatch(_)
        )
    }
}
