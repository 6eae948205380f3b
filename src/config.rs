//! Configuration for the Causeway client
//!
//! A plain config struct with validation; the client derives its CCID from
//! the private key at construction time.

use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// FQDN of the user's own host (no scheme, e.g. "alpha.concord.example")
    pub host: String,

    /// Ed25519 private key seed as a 64-char hex string
    pub private_key: String,

    /// Client identifier embedded in signed-object metadata
    pub client_name: String,

    /// Timeout applied to every transport call
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Default transport timeout (30 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a config with default client name and timeout
    pub fn new(host: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            private_key: private_key.into(),
            client_name: "causeway".to_string(),
            request_timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the client identifier
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Set the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host is required".to_string());
        }

        if self.host.contains("://") {
            return Err("host must be a bare FQDN without scheme".to_string());
        }

        if self.private_key.len() != 64 || hex::decode(&self.private_key).is_err() {
            return Err("private_key must be a 64-char hex seed".to_string());
        }

        Ok(())
    }
}
