//! Protocol messages.
//!
//! A replication cycle is handshake, pull, then push. Every message has
//! `encode`/`decode` pairs over CBOR.

use crate::codec;
use crate::conflict::Conflict;
use crate::error::ProtocolResult;
use crate::operation::ReplicationOp;
use crate::PROTOCOL_VERSION;
use serde::{Deserialize, Serialize};

/// Handshake request from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeRequest {
    /// Stable client identity, a UUID string.
    pub client_id: String,
    /// Protocol version the client speaks.
    pub protocol_version: u16,
    /// The client's last acknowledged server cursor.
    pub last_cursor: u64,
}

impl HandshakeRequest {
    /// Creates a handshake request at the current protocol version.
    pub fn new(client_id: impl Into<String>, last_cursor: u64) -> Self {
        Self {
            client_id: client_id.into(),
            protocol_version: PROTOCOL_VERSION,
            last_cursor,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

/// Handshake response from a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeResponse {
    /// Whether the handshake was accepted.
    pub success: bool,
    /// Rejection reason, when not accepted.
    pub error: Option<String>,
    /// Protocol version the server speaks.
    pub protocol_version: u16,
    /// The server's current cursor.
    pub server_cursor: u64,
}

impl HandshakeResponse {
    /// Creates an accepted handshake.
    pub fn success(server_cursor: u64) -> Self {
        Self {
            success: true,
            error: None,
            protocol_version: PROTOCOL_VERSION,
            server_cursor,
        }
    }

    /// Creates a rejected handshake.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            protocol_version: PROTOCOL_VERSION,
            server_cursor: 0,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

/// Pull request: give me operations after `cursor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Cursor to pull from, exclusive.
    pub cursor: u64,
    /// Maximum number of operations to return.
    pub limit: u32,
}

impl PullRequest {
    /// Creates a pull request.
    pub fn new(cursor: u64, limit: u32) -> Self {
        Self { cursor, limit }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

/// Pull response: operations after the requested cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Operations in log order.
    pub operations: Vec<ReplicationOp>,
    /// Cursor after the returned operations.
    pub new_cursor: u64,
    /// Whether further operations are pending.
    pub has_more: bool,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(operations: Vec<ReplicationOp>, new_cursor: u64, has_more: bool) -> Self {
        Self {
            operations,
            new_cursor,
            has_more,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

/// Push request: apply these client operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Operations in client commit order.
    pub operations: Vec<ReplicationOp>,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(operations: Vec<ReplicationOp>) -> Self {
        Self { operations }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

/// Push response: what the server did with the pushed operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the push was processed.
    pub success: bool,
    /// Server cursor after the push.
    pub new_cursor: u64,
    /// Divergent writes the server resolved, if any.
    pub conflicts: Vec<Conflict>,
    /// Failure reason, when not processed.
    pub error: Option<String>,
}

impl PushResponse {
    /// Creates a clean push response.
    pub fn success(new_cursor: u64) -> Self {
        Self {
            success: true,
            new_cursor,
            conflicts: Vec::new(),
            error: None,
        }
    }

    /// Creates a processed push response that resolved conflicts.
    pub fn with_conflicts(new_cursor: u64, conflicts: Vec<Conflict>) -> Self {
        Self {
            success: true,
            new_cursor,
            conflicts,
            error: None,
        }
    }

    /// Creates a failed push response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            new_cursor: 0,
            conflicts: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictPolicy;
    use foliodb_core::{DocumentId, Revision};

    #[test]
    fn handshake_roundtrip() {
        let req = HandshakeRequest::new("client-1", 42);
        let decoded = HandshakeRequest::decode(&req.encode().unwrap()).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(decoded.protocol_version, PROTOCOL_VERSION);

        let resp = HandshakeResponse::success(99);
        let decoded = HandshakeResponse::decode(&resp.encode().unwrap()).unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.server_cursor, 99);
    }

    #[test]
    fn handshake_rejection_carries_reason() {
        let resp = HandshakeResponse::error("version mismatch");
        let decoded = HandshakeResponse::decode(&resp.encode().unwrap()).unwrap();
        assert!(!decoded.success);
        assert_eq!(decoded.error.as_deref(), Some("version mismatch"));
    }

    #[test]
    fn pull_roundtrip_with_operations() {
        let ops = vec![
            ReplicationOp::put(
                1,
                DocumentId::new("a").unwrap(),
                Revision::new(1, "0011223344556677"),
                vec![9, 9],
            ),
            ReplicationOp::delete(
                2,
                DocumentId::new("b").unwrap(),
                Revision::new(2, "8899aabbccddeeff"),
            ),
        ];
        let resp = PullResponse::new(ops, 2, true);
        let decoded = PullResponse::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded, resp);
    }

    #[test]
    fn push_roundtrip_with_conflicts() {
        let conflict = Conflict::resolve(
            DocumentId::new("c").unwrap(),
            Revision::new(1, "00"),
            Revision::new(2, "ff"),
            ConflictPolicy::default(),
        );
        let resp = PushResponse::with_conflicts(7, vec![conflict]);
        let decoded = PushResponse::decode(&resp.encode().unwrap()).unwrap();
        assert!(decoded.success);
        assert_eq!(decoded.conflicts.len(), 1);
    }
}
