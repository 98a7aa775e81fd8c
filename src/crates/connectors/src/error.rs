//! Error types for the external collaborator clients.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to an agent runtime, the workflow
/// engine, the trace backend or the log sink.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Downstream rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The remote side rejected the payload.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response from the remote side.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Non-success status that maps to no other kind.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local I/O failure (log sink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Check if the failure may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::HttpError(e) => !e.is_decode(),
            ClientError::RateLimitExceeded(_)
            | ClientError::Timeout(_)
            | ClientError::ProviderError(_)
            | ClientError::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::AuthenticationError(_))
    }

    /// Check if the remote side reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Map a non-success HTTP status and body to an error kind.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => ClientError::AuthenticationError(body),
            404 => ClientError::NotFound(body),
            400 | 422 => ClientError::ValidationError(body),
            408 | 504 => ClientError::Timeout(body),
            429 => ClientError::RateLimitExceeded(body),
            _ => ClientError::ProviderError(format!("{}: {}", status, body)),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        assert!(ClientError::from_status(StatusCode::UNAUTHORIZED, String::new()).is_auth_error());
        assert!(ClientError::from_status(StatusCode::NOT_FOUND, String::new()).is_not_found());
        assert!(matches!(
            ClientError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            ClientError::RateLimitExceeded(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_REQUEST, String::new()),
            ClientError::ValidationError(_)
        ));
        assert!(matches!(
            ClientError::from_status(StatusCode::BAD_GATEWAY, String::new()),
            ClientError::ProviderError(_)
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::RateLimitExceeded("x".into()).is_transient());
        assert!(ClientError::Timeout("x".into()).is_transient());
        assert!(!ClientError::NotFound("x".into()).is_transient());
        assert!(!ClientError::ValidationError("x".into()).is_transient());
    }
}
