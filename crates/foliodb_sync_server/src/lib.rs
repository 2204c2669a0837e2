//! # FolioDB Sync Server
//!
//! Reference sync server for FolioDB replication.
//!
//! The server keeps an authoritative in-memory store plus an operation
//! log and answers the three replication endpoints:
//!
//! - `/sync/handshake` negotiates the protocol version and reports the
//!   server cursor
//! - `/sync/pull` streams operations after a client's cursor
//! - `/sync/push` applies client operations, resolving divergence with
//!   the configured conflict policy
//!
//! # Authentication
//!
//! Authentication is optional. When enabled the server validates an
//! HMAC-SHA256 bearer token on every request; tokens travel in the
//! `Authorization` header, never in URLs.
//!
//! ```
//! use foliodb_sync_server::{ServerConfig, SyncServer};
//!
//! let config = ServerConfig::default().with_auth(b"shared-secret".to_vec());
//! let server = SyncServer::new(config).unwrap();
//! let token = server.issue_token("laptop-1").unwrap();
//! # let _ = token;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod config;
mod error;
mod handler;
mod oplog;
mod server;

pub use auth::{AuthConfig, TokenValidator};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use oplog::ServerLog;
pub use server::SyncServer;
