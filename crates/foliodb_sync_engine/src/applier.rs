//! Appliers bridge a local document store and the replication protocol.

use crate::error::{SyncError, SyncResult};
use foliodb_core::{
    decode_document, encode_document, ChangeEvent, ChangeKind, DocumentId, Revision, Store,
};
use foliodb_sync_protocol::{Conflict, ConflictPolicy, ConflictWinner, OperationKind, ReplicationOp};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Callback surface the replicator drives.
pub trait SyncApplier: Send + Sync {
    /// Applies a batch of remote operations, returning resolved conflicts.
    fn apply_remote_operations(&self, operations: &[ReplicationOp]) -> SyncResult<Vec<Conflict>>;

    /// Returns up to `limit` local operations awaiting push.
    fn pending_operations(&self, limit: u32) -> SyncResult<Vec<ReplicationOp>>;

    /// Drops pending operations up to and including `op_id` after a
    /// successful push.
    fn acknowledge(&self, op_id: u64) -> SyncResult<()>;

    /// Returns the last acknowledged server cursor.
    fn server_cursor(&self) -> SyncResult<u64>;

    /// Records the server cursor after a pull or push.
    fn set_server_cursor(&self, cursor: u64) -> SyncResult<()>;
}

/// A [`SyncApplier`] backed by a [`Store`].
///
/// Local commits are collected from the store's change feed; operations
/// the applier itself wrote while pulling are recognized by (id, revision)
/// and not echoed back to the server.
pub struct StoreApplier {
    store: Arc<Store>,
    policy: ConflictPolicy,
    events: Mutex<Receiver<ChangeEvent>>,
    pending: Mutex<VecDeque<ReplicationOp>>,
    remote_echo: Mutex<HashSet<(DocumentId, Revision)>>,
    next_op_id: AtomicU64,
    server_cursor: AtomicU64,
}

impl StoreApplier {
    /// Creates an applier over `store`.
    ///
    /// The store's current documents are queued for push, so a replica
    /// that has never synced uploads its existing state on the first
    /// cycle. Re-queuing across restarts is harmless: pushes are
    /// idempotent per revision.
    pub fn new(store: Arc<Store>, policy: ConflictPolicy) -> SyncResult<Self> {
        let events = store.subscribe();
        let mut pending = VecDeque::new();
        let mut op_id = 0u64;
        for doc in store.all_docs_with_options(
            foliodb_core::ListOptions::new().include_attachment_data(true),
        )? {
            let revision = doc
                .rev()
                .cloned()
                .ok_or_else(|| SyncError::Protocol("stored document without revision".into()))?;
            op_id += 1;
            pending.push_back(ReplicationOp::put(
                op_id,
                doc.id().clone(),
                revision,
                encode_document(&doc)?,
            ));
        }

        Ok(Self {
            store,
            policy,
            events: Mutex::new(events),
            pending: Mutex::new(pending),
            remote_echo: Mutex::new(HashSet::new()),
            next_op_id: AtomicU64::new(op_id + 1),
            server_cursor: AtomicU64::new(0),
        })
    }

    /// Number of operations currently queued for push.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Moves newly committed store changes into the pending queue,
    /// skipping changes that originated from a pull.
    fn drain_events(&self) -> SyncResult<()> {
        let events = self.events.lock();
        let mut pending = self.pending.lock();
        let mut echo = self.remote_echo.lock();

        while let Ok(event) = events.try_recv() {
            let key = (event.id.clone(), event.revision.clone());
            if echo.remove(&key) {
                continue;
            }

            match event.kind {
                ChangeKind::Insert | ChangeKind::Update => {
                    // Re-read for the attachment payloads; skip if the
                    // document moved on, a later event covers it.
                    match self.store.get_with_attachments(&event.id) {
                        Ok(doc) if doc.rev() == Some(&event.revision) => {
                            let op_id = self.next_op_id.fetch_add(1, Ordering::SeqCst);
                            pending.push_back(ReplicationOp::put(
                                op_id,
                                event.id,
                                event.revision,
                                encode_document(&doc)?,
                            ));
                        }
                        Ok(_) => {}
                        Err(foliodb_core::StoreError::NotFound { .. }) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                ChangeKind::Delete => {
                    let op_id = self.next_op_id.fetch_add(1, Ordering::SeqCst);
                    pending.push_back(ReplicationOp::delete(op_id, event.id, event.revision));
                }
            }
        }

        // Remote ops the store ignored (superseded puts, deletes of
        // unknown ids) emit no event. The channel is drained, so any
        // entry still here can never match; drop them all.
        echo.clear();
        Ok(())
    }

    #[cfg(test)]
    fn echo_len(&self) -> usize {
        self.remote_echo.lock().len()
    }
}

impl SyncApplier for StoreApplier {
    fn apply_remote_operations(&self, operations: &[ReplicationOp]) -> SyncResult<Vec<Conflict>> {
        let mut conflicts = Vec::new();

        for op in operations {
            self.remote_echo
                .lock()
                .insert((op.doc_id.clone(), op.revision.clone()));

            // Divergence: the remote op does not build on our latest
            // revision of this document.
            let local_rev = match self.store.get(&op.doc_id) {
                Ok(doc) => doc.rev().cloned(),
                Err(foliodb_core::StoreError::NotFound { .. }) => None,
                Err(err) => return Err(err.into()),
            };
            let mut keep_local = false;
            if let Some(local_rev) = local_rev {
                if local_rev != op.revision && op.revision.generation() <= local_rev.generation() {
                    let conflict = Conflict::resolve(
                        op.doc_id.clone(),
                        local_rev,
                        op.revision.clone(),
                        self.policy,
                    );
                    keep_local = conflict.winner == ConflictWinner::Local;
                    conflicts.push(conflict);
                }
            }
            if keep_local {
                continue;
            }

            match op.kind {
                OperationKind::Put => {
                    let payload = op
                        .payload
                        .as_deref()
                        .ok_or_else(|| SyncError::Protocol("put operation without payload".into()))?;
                    let doc = decode_document(payload)?;
                    self.store.apply_remote(doc)?;
                }
                OperationKind::Delete => {
                    self.store.apply_remote_delete(&op.doc_id, &op.revision)?;
                }
            }
        }

        Ok(conflicts)
    }

    fn pending_operations(&self, limit: u32) -> SyncResult<Vec<ReplicationOp>> {
        self.drain_events()?;
        Ok(self
            .pending
            .lock()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn acknowledge(&self, op_id: u64) -> SyncResult<()> {
        let mut pending = self.pending.lock();
        while pending.front().is_some_and(|op| op.op_id <= op_id) {
            pending.pop_front();
        }
        Ok(())
    }

    fn server_cursor(&self) -> SyncResult<u64> {
        Ok(self.server_cursor.load(Ordering::SeqCst))
    }

    fn set_server_cursor(&self, cursor: u64) -> SyncResult<()> {
        self.server_cursor.store(cursor, Ordering::SeqCst);
        Ok(())
    }
}

/// An in-memory applier for replicator tests.
#[derive(Default)]
pub struct MemoryApplier {
    pending: Mutex<VecDeque<ReplicationOp>>,
    applied: Mutex<Vec<ReplicationOp>>,
    server_cursor: AtomicU64,
}

impl MemoryApplier {
    /// Creates an empty applier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an operation for push.
    pub fn add_pending(&self, op: ReplicationOp) {
        self.pending.lock().push_back(op);
    }

    /// Returns all operations applied from pulls.
    pub fn applied_operations(&self) -> Vec<ReplicationOp> {
        self.applied.lock().clone()
    }
}

impl SyncApplier for MemoryApplier {
    fn apply_remote_operations(&self, operations: &[ReplicationOp]) -> SyncResult<Vec<Conflict>> {
        self.applied.lock().extend(operations.iter().cloned());
        Ok(Vec::new())
    }

    fn pending_operations(&self, limit: u32) -> SyncResult<Vec<ReplicationOp>> {
        Ok(self
            .pending
            .lock()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn acknowledge(&self, op_id: u64) -> SyncResult<()> {
        let mut pending = self.pending.lock();
        while pending.front().is_some_and(|op| op.op_id <= op_id) {
            pending.pop_front();
        }
        Ok(())
    }

    fn server_cursor(&self) -> SyncResult<u64> {
        Ok(self.server_cursor.load(Ordering::SeqCst))
    }

    fn set_server_cursor(&self, cursor: u64) -> SyncResult<()> {
        self.server_cursor.store(cursor, Ordering::SeqCst);
        Ok(())
    }
}
