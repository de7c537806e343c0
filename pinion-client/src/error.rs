// ABOUTME: Typed client errors that front-ends branch on.
// ABOUTME: Carried inside anyhow::Error and recovered with downcast_ref.

use thiserror::Error;

/// Conditions a front-end must recognise rather than just print.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The agent file is a private version and needs a key secret to decrypt.
    #[error("key_secret required for private version")]
    KeySecretRequired,

    /// Neither credentials nor an agent file were supplied.
    #[error("client is not configured: {0}")]
    NotConfigured(String),

    /// The live-agent transport refused or dropped the request.
    #[error("live transport error: {0}")]
    LiveTransport(String),

    /// Any other failure reported by the backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl ClientError {
    /// True when `err` wraps `ClientError::KeySecretRequired`.
    pub fn is_key_secret_required(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::KeySecretRequired)
        )
    }
}
