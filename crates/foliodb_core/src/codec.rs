//! CBOR encoding for documents and journal records.

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
pub(crate) fn to_cbor<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
pub(crate) fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
}

/// Encodes a document (attachments inline) to CBOR bytes.
///
/// This is the payload format used in the journal and on the replication
/// wire.
pub fn encode_document(doc: &Document) -> StoreResult<Vec<u8>> {
    to_cbor(doc)
}

/// Decodes a document from CBOR bytes.
pub fn decode_document(bytes: &[u8]) -> StoreResult<Document> {
    from_cbor(bytes)
}
