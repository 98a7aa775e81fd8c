//! Common configuration structures for the HTTP clients.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings shared by every HTTP collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the remote service.
    ///
    /// Examples:
    /// - n8n: "http://localhost:5678"
    /// - Langfuse: "https://cloud.langfuse.com"
    pub base_url: String,

    /// API key or public key, depending on the service.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Secret key for services using basic auth.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Create a new endpoint configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            secret_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the secret key.
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// API key, failing when it is missing or blank.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ClientError::ConfigError(format!(
                "API key missing for {}",
                self.base_url
            ))),
        }
    }

    /// Build a reqwest client honoring the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(ClientError::HttpError)
    }
}

fn default_timeout_secs() -> u64 {
    30
}
