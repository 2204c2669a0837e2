//! Replication state machine.

use crate::applier::SyncApplier;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use foliodb_sync_protocol::{
    Conflict, HandshakeRequest, PullRequest, PushRequest, PROTOCOL_VERSION,
};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The current state of a replicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not syncing.
    Idle,
    /// Handshaking with the server.
    Connecting,
    /// Applying remote operations.
    Pulling,
    /// Uploading local operations.
    Pushing,
    /// Last cycle completed cleanly.
    Synced,
    /// Last cycle failed.
    Error,
    /// Waiting before a retry.
    RetryWait,
}

impl SyncState {
    /// Returns true while a cycle is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Pulling | Self::Pushing)
    }

    /// Returns true when a new cycle may start.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, Self::Idle | Self::Synced | Self::Error)
    }
}

/// Counters across the replicator's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed cycles.
    pub cycles_completed: u64,
    /// Operations pulled in total.
    pub operations_pulled: u64,
    /// Operations pushed in total.
    pub operations_pushed: u64,
    /// Conflicts resolved in total.
    pub conflicts_resolved: u64,
    /// Retries performed.
    pub retries: u64,
    /// When the last successful cycle finished.
    pub last_sync_time: Option<Instant>,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
}

/// Outcome of one replication cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// Operations pulled and applied locally.
    pub pulled: u64,
    /// Operations pushed and acknowledged.
    pub pushed: u64,
    /// Divergent writes resolved during the cycle.
    pub conflicts: Vec<Conflict>,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
}

/// Drives pull-then-push replication against one server.
///
/// Pull always runs before push, so the local store sees the server's
/// state before uploading its own, and conflict resolution happens once,
/// locally.
pub struct Replicator<T: SyncTransport, A: SyncApplier> {
    config: SyncConfig,
    transport: Arc<T>,
    applier: Arc<A>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<T: SyncTransport, A: SyncApplier> Replicator<T, A> {
    /// Creates a replicator.
    pub fn new(config: SyncConfig, transport: T, applier: A) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            applier: Arc::new(applier),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a snapshot of the lifetime counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Requests cancellation of the in-flight cycle.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn fail(&self, error: &SyncError) {
        // An aborted cycle is not a failure; leave the replicator
        // restartable and the last error untouched.
        if matches!(error, SyncError::Cancelled) {
            self.set_state(SyncState::Idle);
            tracing::debug!("sync cycle cancelled");
            return;
        }
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
        tracing::warn!(error = %error, "sync cycle failed");
    }

    /// Runs one pull-then-push cycle.
    pub fn sync(&self) -> SyncResult<SyncCycleResult> {
        let start = Instant::now();
        self.cancelled.store(false, Ordering::SeqCst);

        if !self.state().can_start_sync() {
            return Err(SyncError::SyncInFlight);
        }

        self.set_state(SyncState::Connecting);
        if let Err(err) = self.handshake() {
            self.fail(&err);
            return Err(err);
        }
        if let Err(err) = self.check_cancelled() {
            self.fail(&err);
            return Err(err);
        }

        self.set_state(SyncState::Pulling);
        let (pulled, mut conflicts) = match self.pull_all() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };
        if let Err(err) = self.check_cancelled() {
            self.fail(&err);
            return Err(err);
        }

        self.set_state(SyncState::Pushing);
        let (pushed, push_conflicts) = match self.push_all() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };
        conflicts.extend(push_conflicts);

        self.set_state(SyncState::Synced);
        let result = SyncCycleResult {
            pulled,
            pushed,
            conflicts,
            duration: start.elapsed(),
        };

        let mut stats = self.stats.write();
        stats.cycles_completed += 1;
        stats.operations_pulled += result.pulled;
        stats.operations_pushed += result.pushed;
        stats.conflicts_resolved += result.conflicts.len() as u64;
        stats.last_sync_time = Some(Instant::now());
        stats.last_error = None;
        drop(stats);

        tracing::debug!(
            pulled = result.pulled,
            pushed = result.pushed,
            conflicts = result.conflicts.len(),
            "sync cycle complete"
        );
        Ok(result)
    }

    /// Runs a cycle, retrying transient failures with backoff.
    pub fn sync_with_retry(&self) -> SyncResult<SyncCycleResult> {
        let retry = self.config.retry.clone();
        let mut last_error = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                self.set_state(SyncState::RetryWait);
                std::thread::sleep(retry.delay_for_attempt(attempt));
                self.stats.write().retries += 1;
            }
            self.check_cancelled()?;

            match self.sync() {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt + 1 < retry.max_attempts => {
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| SyncError::Protocol("no sync attempts made".into())))
    }

    fn handshake(&self) -> SyncResult<()> {
        let cursor = self.applier.server_cursor()?;
        let request = HandshakeRequest::new(self.config.client_id.clone(), cursor);
        let response = self.transport.handshake(&request)?;

        if !response.success {
            return Err(SyncError::ServerError(
                response.error.unwrap_or_else(|| "handshake rejected".into()),
            ));
        }
        if response.protocol_version != PROTOCOL_VERSION {
            return Err(SyncError::VersionMismatch {
                local: PROTOCOL_VERSION,
                remote: response.protocol_version,
            });
        }
        Ok(())
    }

    fn pull_all(&self) -> SyncResult<(u64, Vec<Conflict>)> {
        let mut pulled = 0u64;
        let mut conflicts = Vec::new();

        loop {
            self.check_cancelled()?;

            let cursor = self.applier.server_cursor()?;
            let response = self
                .transport
                .pull(&PullRequest::new(cursor, self.config.pull_batch_size))?;

            if !response.operations.is_empty() {
                conflicts.extend(self.applier.apply_remote_operations(&response.operations)?);
                pulled += response.operations.len() as u64;
            }
            self.applier.set_server_cursor(response.new_cursor)?;

            if !response.has_more {
                break;
            }
        }

        Ok((pulled, conflicts))
    }

    fn push_all(&self) -> SyncResult<(u64, Vec<Conflict>)> {
        let mut pushed = 0u64;
        let mut conflicts = Vec::new();

        loop {
            self.check_cancelled()?;

            let operations = self
                .applier
                .pending_operations(self.config.push_batch_size)?;
            if operations.is_empty() {
                break;
            }

            let response = self.transport.push(&PushRequest::new(operations.clone()))?;
            if !response.success {
                return Err(SyncError::ServerError(
                    response.error.unwrap_or_else(|| "push rejected".into()),
                ));
            }

            if let Some(max_op_id) = operations.iter().map(|op| op.op_id).max() {
                self.applier.acknowledge(max_op_id)?;
            }
            pushed += operations.len() as u64;
            conflicts.extend(response.conflicts);
            self.applier.set_server_cursor(response.new_cursor)?;
        }

        Ok((pushed, conflicts))
    }
}
