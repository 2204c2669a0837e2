//! Server configuration.

use foliodb_sync_protocol::ConflictPolicy;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum batch size for pull responses.
    pub max_pull_batch: u32,
    /// Maximum batch size for push requests.
    pub max_push_batch: u32,
    /// Whether to require a bearer token on every request.
    pub require_auth: bool,
    /// Secret key for token validation (if auth enabled).
    pub auth_secret: Option<Vec<u8>>,
    /// Policy applied when a pushed operation diverges from server state.
    pub conflict_policy: ConflictPolicy,
}

impl ServerConfig {
    /// Creates a configuration with the default limits and no auth.
    pub fn new() -> Self {
        Self {
            max_pull_batch: 100,
            max_push_batch: 100,
            require_auth: false,
            auth_secret: None,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    /// Sets the maximum pull batch size.
    pub fn with_max_pull_batch(mut self, size: u32) -> Self {
        self.max_pull_batch = size;
        self
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: u32) -> Self {
        self.max_push_batch = size;
        self
    }

    /// Enables authentication with the given secret.
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.require_auth = true;
        self.auth_secret = Some(secret);
        self
    }

    /// Sets the conflict policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_pull_batch, 100);
        assert!(!config.require_auth);
        assert!(config.auth_secret.is_none());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_max_pull_batch(50)
            .with_max_push_batch(25)
            .with_auth(vec![1, 2, 3, 4]);

        assert_eq!(config.max_pull_batch, 50);
        assert_eq!(config.max_push_batch, 25);
        assert!(config.require_auth);
        assert_eq!(config.auth_secret, Some(vec![1, 2, 3, 4]));
    }
}
