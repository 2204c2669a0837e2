//! # FolioDB Sync Engine
//!
//! Replication state machine and engine for FolioDB.
//!
//! This crate provides:
//! - A pull-then-push replicator with cursor management
//! - Deterministic conflict resolution during pull
//! - Retry with exponential backoff
//! - An HTTP transport abstraction with externally supplied,
//!   rotatable credentials
//! - A store-backed applier wiring replication to `foliodb_core`
//! - One-shot sync with a busy guard, and continuous background sync
//!
//! ## Architecture
//!
//! Replication is pull-then-push:
//! 1. Pull remote operations (the server is authoritative)
//! 2. Apply them locally, resolving divergence by revision order
//! 3. Push pending local operations
//!
//! All sync state lives in explicit objects; nothing is process-global,
//! so one process can replicate several stores against several servers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod continuous;
mod error;
mod http;
mod manual;
mod replicator;
mod transport;

pub use applier::{MemoryApplier, StoreApplier, SyncApplier};
pub use config::{RetryConfig, SyncConfig};
pub use continuous::{ContinuousReplicator, ReplicationEvent};
pub use error::{SyncError, SyncResult};
pub use http::{
    CredentialProvider, HttpClient, HttpTransport, LoopbackClient, LoopbackServer,
    StaticCredentials,
};
pub use manual::{ManualSync, ManualSyncStatus, SyncOutcome};
pub use replicator::{Replicator, SyncCycleResult, SyncState, SyncStats};
pub use transport::{MockTransport, SyncTransport};
