//! Debrid error taxonomy

use thiserror::Error;

/// Result alias for provider operations
pub type Result<T> = std::result::Result<T, DebridError>;

/// Errors surfaced by debrid providers
#[derive(Error, Debug)]
pub enum DebridError {
    /// Content exists on the provider but is still processing
    #[error("Content is not ready yet")]
    NotReady,

    /// Provider rejected the credential (401/403)
    #[error("API key expired or invalid")]
    ExpiredCredential,

    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Polling budget exhausted without a populated file list
    #[error("Files unavailable for torrent {hash}")]
    FilesUnavailable { hash: String },

    #[error("{operation} is not supported by {provider}")]
    UnsupportedOperation {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DebridError {
    pub(crate) fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        DebridError::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(self, DebridError::NotReady)
    }
}
