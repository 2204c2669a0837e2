//! Append-only journal.
//!
//! Every committed mutation is appended as a framed record:
//!
//! ```text
//! ┌────────────┬─────────────┬──────────────────┐
//! │ len (u32)  │ crc32 (u32) │ CBOR payload     │
//! └────────────┴─────────────┴──────────────────┘
//! ```
//!
//! On open the journal is replayed to rebuild the live document set.
//! A torn write at the tail (partial frame or checksum mismatch on the
//! last record) is discarded; corruption anywhere else is an error.

use crate::codec::{from_cbor, to_cbor};
use crate::document::{Document, DocumentId};
use crate::error::{StoreError, StoreResult};
use crate::revision::Revision;
use foliodb_storage::StorageBackend;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const FRAME_HEADER: usize = 8;

/// A single journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// A document was inserted or replaced.
    Put {
        /// Commit sequence.
        seq: u64,
        /// The full document, attachments inline.
        doc: Document,
    },
    /// A document was deleted.
    Delete {
        /// Commit sequence.
        seq: u64,
        /// The deleted document's id.
        id: DocumentId,
        /// The tombstone revision.
        rev: Revision,
    },
}

impl JournalRecord {
    /// Returns the commit sequence of this record.
    #[must_use]
    pub fn seq(&self) -> u64 {
        match self {
            JournalRecord::Put { seq, .. } | JournalRecord::Delete { seq, .. } => *seq,
        }
    }
}

/// The journal: framed records over a storage backend.
pub(crate) struct Journal {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl Journal {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a record and makes it durable per the commit policy.
    pub(crate) fn append(&self, record: &JournalRecord) -> StoreResult<()> {
        let payload = to_cbor(record)?;
        let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        let mut backend = self.backend.lock();
        backend.append(&frame)?;
        if self.sync_on_commit {
            backend.sync_all()?;
        } else {
            backend.flush()?;
        }
        Ok(())
    }

    /// Reads all records, discarding a torn tail.
    pub(crate) fn read_all(&self) -> StoreResult<Vec<JournalRecord>> {
        let backend = self.backend.lock();
        let size = backend.size()?;
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset < size {
            if size - offset < FRAME_HEADER as u64 {
                break; // torn header at the tail
            }
            let header = backend.read_at(offset, FRAME_HEADER)?;
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            let payload_offset = offset + FRAME_HEADER as u64;
            if payload_offset + len > size {
                break; // torn payload at the tail
            }

            let payload = backend.read_at(payload_offset, len as usize)?;
            if crc32(&payload) != expected_crc {
                if payload_offset + len == size {
                    break; // torn write of the last record
                }
                return Err(StoreError::journal_corruption(format!(
                    "checksum mismatch at offset {offset}"
                )));
            }

            records.push(from_cbor(&payload)?);
            offset = payload_offset + len;
        }

        Ok(records)
    }

    /// Replaces the journal contents with the given records.
    ///
    /// Used by compaction: live state is rewritten and history discarded.
    pub(crate) fn rewrite(&self, records: &[JournalRecord]) -> StoreResult<()> {
        let mut frames = Vec::new();
        for record in records {
            let payload = to_cbor(record)?;
            frames.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            frames.extend_from_slice(&crc32(&payload).to_le_bytes());
            frames.extend_from_slice(&payload);
        }

        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        backend.append(&frames)?;
        backend.sync_all()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}

/// CRC32 (IEEE) over a byte slice.
fn crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use foliodb_storage::InMemoryBackend;

    fn put_record(seq: u64) -> JournalRecord {
        let mut doc = Document::with_id(DocumentId::generate(), "t", "b");
        doc.set_rev(Revision::first("abcd"));
        JournalRecord::Put { seq, doc }
    }

    #[test]
    fn append_and_read_back() {
        let journal = Journal::new(Box::new(InMemoryBackend::new()), false);

        journal.append(&put_record(1)).unwrap();
        journal.append(&put_record(2)).unwrap();

        let records = journal.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq(), 1);
        assert_eq!(records[1].seq(), 2);
    }

    #[test]
    fn torn_tail_is_discarded() {
        let journal = Journal::new(Box::new(InMemoryBackend::new()), false);
        journal.append(&put_record(1)).unwrap();

        // Re-open over the same bytes plus a torn frame.
        let mut bytes = {
            let backend = journal.backend.lock();
            backend.read_at(0, backend.size().unwrap() as usize).unwrap()
        };
        bytes.extend_from_slice(&[0x20, 0x00, 0x00, 0x00, 0xDE, 0xAD]);

        let reopened = Journal::new(Box::new(InMemoryBackend::with_data(bytes)), false);
        let records = reopened.read_all().unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn mid_journal_corruption_is_an_error() {
        let journal = Journal::new(Box::new(InMemoryBackend::new()), false);
        journal.append(&put_record(1)).unwrap();
        journal.append(&put_record(2)).unwrap();

        let mut bytes = {
            let backend = journal.backend.lock();
            backend.read_at(0, backend.size().unwrap() as usize).unwrap()
        };
        // Flip a payload byte in the first record.
        bytes[FRAME_HEADER + 2] ^= 0xFF;

        let reopened = Journal::new(Box::new(InMemoryBackend::with_data(bytes)), false);
        assert!(matches!(
            reopened.read_all(),
            Err(StoreError::JournalCorruption(_))
        ));
    }

    #[test]
    fn rewrite_shrinks_the_journal() {
        let journal = Journal::new(Box::new(InMemoryBackend::new()), false);
        for seq in 1..=10 {
            journal.append(&put_record(seq)).unwrap();
        }
        let before = journal.size().unwrap();

        journal.rewrite(&[put_record(11)]).unwrap();
        assert!(journal.size().unwrap() < before);
        assert_eq!(journal.read_all().unwrap().len(), 1);
    }

    #[test]
    fn delete_record_roundtrip() {
        let journal = Journal::new(Box::new(InMemoryBackend::new()), false);
        let id = DocumentId::generate();
        journal
            .append(&JournalRecord::Delete {
                seq: 3,
                id: id.clone(),
                rev: Revision::new(2, "ffff"),
            })
            .unwrap();

        let records = journal.read_all().unwrap();
        match &records[0] {
            JournalRecord::Delete { seq, id: got, rev } => {
                assert_eq!(*seq, 3);
                assert_eq!(got, &id);
                assert_eq!(rev.generation(), 2);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
