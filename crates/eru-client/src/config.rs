//! Client configuration

use std::time::Duration;

use crate::client::EruClient;
use crate::error::EruResult;

/// Configuration for [`EruClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the ERU API, e.g. "http://eru.intra:5000".
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Basic-auth username; empty means anonymous access.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(5),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Builder for [`EruClient`].
pub struct EruClientBuilder {
    config: ClientConfig,
}

impl EruClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    /// Validate the URL and construct the client.
    pub fn build(self) -> EruResult<EruClient> {
        EruClient::with_config(self.config)
    }
}

impl Default for EruClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
