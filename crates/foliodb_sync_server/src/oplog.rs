//! Server-side operation log.
//!
//! Pushed operations are validated against an authoritative in-memory
//! [`Store`] before they are appended. The store's revision ordering
//! decides what the server keeps; the log is the replayable history
//! that clients pull from.

use crate::error::{ServerError, ServerResult};
use foliodb_core::{decode_document, RemoteOutcome, Store};
use foliodb_sync_protocol::{Conflict, ConflictPolicy, ConflictWinner, OperationKind, ReplicationOp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Server-side operation log backed by an authoritative store.
pub struct ServerLog {
    store: Store,
    operations: RwLock<Vec<ReplicationOp>>,
    next_op_id: AtomicU64,
}

impl ServerLog {
    /// Creates an empty log with a fresh in-memory store.
    pub fn new() -> ServerResult<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            operations: RwLock::new(Vec::new()),
            next_op_id: AtomicU64::new(1),
        })
    }

    /// Returns the id of the last appended operation, or 0 when empty.
    pub fn cursor(&self) -> u64 {
        self.next_op_id.load(Ordering::SeqCst) - 1
    }

    /// Returns up to `limit` operations with ids greater than `cursor`.
    pub fn operations_since(&self, cursor: u64, limit: u32) -> Vec<ReplicationOp> {
        let ops = self.operations.read();
        ops.iter()
            .filter(|op| op.op_id > cursor)
            .take(limit as usize)
            .cloned()
            .collect()
    }

    /// True when more operations remain past `cursor` + `limit`.
    pub fn has_more_after(&self, cursor: u64, limit: u32) -> bool {
        let ops = self.operations.read();
        ops.iter().filter(|op| op.op_id > cursor).count() > limit as usize
    }

    /// Appends pushed operations, resolving divergence under `policy`.
    ///
    /// Returns the new cursor and any conflicts that were resolved.
    /// Duplicate pushes of a revision the server already holds are
    /// absorbed silently.
    pub fn append(
        &self,
        operations: Vec<ReplicationOp>,
        policy: ConflictPolicy,
    ) -> ServerResult<(u64, Vec<Conflict>)> {
        let mut conflicts = Vec::new();

        for mut op in operations {
            let local_rev = self
                .store
                .get(&op.doc_id)
                .ok()
                .and_then(|doc| doc.rev().cloned());

            if let Some(local) = &local_rev {
                if *local == op.revision {
                    continue;
                }
                // A push that does not build on our latest revision is
                // a divergence; a higher generation is a fast-forward.
                if op.revision.generation() <= local.generation() {
                    let conflict = Conflict::resolve(
                        op.doc_id.clone(),
                        local.clone(),
                        op.revision.clone(),
                        policy,
                    );
                    let keep_local = conflict.winner == ConflictWinner::Local;
                    conflicts.push(conflict);
                    if keep_local {
                        continue;
                    }
                }
            }

            let outcome = match op.kind {
                OperationKind::Put => {
                    let payload = op.payload.as_deref().ok_or_else(|| {
                        ServerError::InvalidRequest("put operation without payload".into())
                    })?;
                    let doc = decode_document(payload)?;
                    self.store.apply_remote(doc)?
                }
                OperationKind::Delete => {
                    self.store.apply_remote_delete(&op.doc_id, &op.revision)?
                }
            };
            if outcome == RemoteOutcome::Ignored {
                continue;
            }

            op.op_id = self.next_op_id.fetch_add(1, Ordering::SeqCst);
            self.operations.write().push(op);
        }

        Ok((self.cursor(), conflicts))
    }

    /// The authoritative store behind the log.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the number of logged operations.
    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    /// Returns true if no operations have been logged.
    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }
}
