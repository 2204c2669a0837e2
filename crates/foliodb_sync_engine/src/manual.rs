//! One-shot sync with a busy guard.

use crate::applier::SyncApplier;
use crate::error::{SyncError, SyncResult};
use crate::replicator::{Replicator, SyncCycleResult};
use crate::transport::SyncTransport;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a finished one-shot sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle completed.
    Success {
        /// Operations pulled.
        pulled: u64,
        /// Operations pushed.
        pushed: u64,
    },
    /// The cycle failed.
    Failed(String),
}

/// Status of the one-shot sync surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualSyncStatus {
    /// No sync running and no recent outcome.
    Idle,
    /// A sync is in flight.
    Syncing,
    /// A sync finished recently; reverts to [`ManualSyncStatus::Idle`]
    /// once the hold period elapses.
    Finished(SyncOutcome),
}

/// Runs user-triggered sync cycles, one at a time.
///
/// A trigger while a cycle is in flight is rejected with
/// [`SyncError::SyncInFlight`] instead of queueing, so a button wired to
/// [`ManualSync::trigger`] cannot stack cycles. The outcome stays
/// readable for a hold period and then the status reverts to idle.
pub struct ManualSync<T: SyncTransport, A: SyncApplier> {
    replicator: Arc<Replicator<T, A>>,
    busy: AtomicBool,
    last_outcome: Mutex<Option<(SyncOutcome, Instant)>>,
    hold: Duration,
}

impl<T: SyncTransport, A: SyncApplier> ManualSync<T, A> {
    /// Creates a one-shot surface over `replicator`.
    ///
    /// The hold period comes from the replicator's configuration.
    pub fn new(replicator: Arc<Replicator<T, A>>) -> Self {
        let hold = replicator.config().status_hold;
        Self {
            replicator,
            busy: AtomicBool::new(false),
            last_outcome: Mutex::new(None),
            hold,
        }
    }

    /// Runs one cycle with retry, unless one is already running.
    pub fn trigger(&self) -> SyncResult<SyncCycleResult> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(SyncError::SyncInFlight);
        }

        let result = self.replicator.sync_with_retry();
        let outcome = match &result {
            Ok(cycle) => SyncOutcome::Success {
                pulled: cycle.pulled,
                pushed: cycle.pushed,
            },
            Err(err) => SyncOutcome::Failed(err.to_string()),
        };
        *self.last_outcome.lock() = Some((outcome, Instant::now()));
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    /// Returns the current status.
    pub fn status(&self) -> ManualSyncStatus {
        if self.busy.load(Ordering::SeqCst) {
            return ManualSyncStatus::Syncing;
        }
        if let Some((outcome, finished_at)) = self.last_outcome.lock().as_ref() {
            if finished_at.elapsed() < self.hold {
                return ManualSyncStatus::Finished(outcome.clone());
            }
        }
        ManualSyncStatus::Idle
    }

    /// Returns the wrapped replicator.
    pub fn replicator(&self) -> &Arc<Replicator<T, A>> {
        &self.replicator
    }
}
