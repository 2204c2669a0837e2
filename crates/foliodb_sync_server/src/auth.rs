//! Token-based authentication using HMAC-SHA256.
//!
//! Tokens carry an issue timestamp and the client id, signed with a
//! shared secret. The raw layout is:
//!
//! - 8 bytes: timestamp (Unix millis, big-endian)
//! - N bytes: client id (UTF-8)
//! - 32 bytes: HMAC-SHA256 signature over the preceding bytes
//!
//! The whole token is hex-encoded so it can travel as a bearer token
//! in an `Authorization` header. Tokens never appear in URLs.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_LEN: usize = 32;
const TIMESTAMP_LEN: usize = 8;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a 24 hour expiry.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Creates and validates client tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `client_id`, hex-encoded for transport.
    pub fn create_token(&self, client_id: &str) -> ServerResult<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut data = Vec::with_capacity(TIMESTAMP_LEN + client_id.len());
        data.extend_from_slice(&timestamp.to_be_bytes());
        data.extend_from_slice(client_id.as_bytes());

        let signature = self.sign(&data)?;
        data.extend_from_slice(&signature);
        Ok(hex::encode(data))
    }

    /// Validates a hex-encoded token, returning the client id it was
    /// issued for.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        let bytes = hex::decode(token)
            .map_err(|_| ServerError::NotAuthorized("malformed token".into()))?;
        if bytes.len() < TIMESTAMP_LEN + SIGNATURE_LEN {
            return Err(ServerError::NotAuthorized("token too short".into()));
        }

        let (payload, signature) = bytes.split_at(bytes.len() - SIGNATURE_LEN);
        let expected = self.sign(payload)?;
        if signature != expected.as_slice() {
            return Err(ServerError::NotAuthorized("bad signature".into()));
        }

        let mut timestamp_bytes = [0u8; TIMESTAMP_LEN];
        timestamp_bytes.copy_from_slice(&payload[..TIMESTAMP_LEN]);
        let issued_ms = u64::from_be_bytes(timestamp_bytes);

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let expiry_ms = self.config.token_expiry.as_millis() as u64;
        if now_ms.saturating_sub(issued_ms) > expiry_ms {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        String::from_utf8(payload[TIMESTAMP_LEN..].to_vec())
            .map_err(|_| ServerError::NotAuthorized("malformed client id".into()))
    }

    fn sign(&self, data: &[u8]) -> ServerResult<[u8; SIGNATURE_LEN]> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::InvalidRequest(format!("bad auth secret: {e}")))?;
        mac.update(data);
        let out = mac.finalize().into_bytes();
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&out);
        Ok(signature)
    }
}
