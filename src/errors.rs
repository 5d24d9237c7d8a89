// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use thiserror::Error;

/// Fixed remediation text for invalid-client-secret provider signatures.
/// Raw provider bodies are never forwarded to callers.
pub const INVALID_CLIENT_SECRET_REMEDIATION: &str =
    "The client secret for this credential is invalid or expired. \
     Generate a new client secret in the identity provider, update the \
     stored credential, and re-run the scan.";

/// Engine-level errors for management API access
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("API request failed with status {status}: {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("rate limited on endpoint class '{label}'")]
    RateLimited { label: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("operation timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    #[error("failed to parse response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("resource not found: {url}")]
    NotFound { url: String },
}

impl EngineError {
    /// Transient failures worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Api { status, .. } => *status == 429 || *status >= 500,
            EngineError::RateLimited { .. } => true,
            EngineError::Network(_) => true,
            EngineError::Timeout { .. } => true,
            EngineError::Auth(_) | EngineError::Parse { .. } | EngineError::NotFound { .. } => {
                false
            }
        }
    }
}

/// Credential resolution and token exchange failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{INVALID_CLIENT_SECRET_REMEDIATION}")]
    InvalidClientSecret,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("token endpoint returned status {status}: {message}")]
    TokenEndpoint { status: u16, message: String },

    #[error("no client secret available for credential")]
    MissingSecret,

    #[error("failed to decrypt stored credential material")]
    Decrypt,

    #[error("stored certificate is invalid or unusable")]
    CertificateInvalid,

    #[error("central secret store unavailable: {0}")]
    SecretStoreUnavailable(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EngineError::Api {
            status: 429,
            url: "u".into(),
            message: "m".into()
        }
        .is_retryable());
        assert!(EngineError::Api {
            status: 503,
            url: "u".into(),
            message: "m".into()
        }
        .is_retryable());
        assert!(!EngineError::Api {
            status: 403,
            url: "u".into(),
            message: "m".into()
        }
        .is_retryable());
        assert!(EngineError::Network("reset".into()).is_retryable());
        assert!(!EngineError::Auth(AuthError::MissingSecret).is_retryable());
    }

    #[test]
    fn test_invalid_secret_message_is_fixed() {
        let err = AuthError::InvalidClientSecret;
        assert_eq!(err.to_string(), INVALID_CLIENT_SECRET_REMEDIATION);
    }
}
