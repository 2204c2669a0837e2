//! Replicated operations.

use crate::codec;
use crate::error::ProtocolResult;
use foliodb_core::{DocumentId, Revision};
use serde::{Deserialize, Serialize};

/// Kind of replicated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Document was inserted or replaced.
    Put,
    /// Document was deleted.
    Delete,
}

/// A single committed change, as transmitted between replicas.
///
/// For puts, `payload` holds the full document (attachments inline) in
/// CBOR; deletes carry only the id and tombstone revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationOp {
    /// Position in the origin's operation log.
    pub op_id: u64,
    /// The affected document's id.
    pub doc_id: DocumentId,
    /// Put or Delete.
    pub kind: OperationKind,
    /// CBOR document bytes, present for puts.
    pub payload: Option<Vec<u8>>,
    /// Revision after the operation (tombstone revision for deletes).
    pub revision: Revision,
}

impl ReplicationOp {
    /// Creates a put operation.
    pub fn put(op_id: u64, doc_id: DocumentId, revision: Revision, payload: Vec<u8>) -> Self {
        Self {
            op_id,
            doc_id,
            kind: OperationKind::Put,
            payload: Some(payload),
            revision,
        }
    }

    /// Creates a delete operation.
    pub fn delete(op_id: u64, doc_id: DocumentId, revision: Revision) -> Self {
        Self {
            op_id,
            doc_id,
            kind: OperationKind::Delete,
            payload: None,
            revision,
        }
    }

    /// Encodes to CBOR bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        codec::encode(self)
    }

    /// Decodes from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        codec::decode(bytes)
    }

    /// Returns the payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.as_ref().map(|p| p.len()).unwrap_or(0)
    }
}
