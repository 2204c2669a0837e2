//! # FolioDB Sync Protocol
//!
//! Replication protocol types and CBOR codecs for FolioDB.
//!
//! This crate provides:
//! - [`ReplicationOp`] for replicated document changes
//! - [`Conflict`] and [`ConflictPolicy`] for divergent-write resolution
//! - Protocol messages (handshake, pull, push)
//!
//! This is a pure protocol crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod conflict;
mod error;
mod messages;
mod operation;

pub use codec::{decode, encode};
pub use conflict::{Conflict, ConflictPolicy, ConflictWinner};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    HandshakeRequest, HandshakeResponse, PullRequest, PullResponse, PushRequest, PushResponse,
};
pub use operation::{OperationKind, ReplicationOp};

/// Protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u16 = 1;
