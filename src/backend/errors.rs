use crate::error::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// A failed backend invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{backend}: request timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("{backend}: connection failed: {message}")]
    Connection { backend: String, message: String },

    #[error("{backend}: server error (HTTP {status}): {message}")]
    Server {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("{backend}: malformed response: {message}")]
    InvalidResponse { backend: String, message: String },

    #[error("{backend}: local runner failed: {message}")]
    Process { backend: String, message: String },

    #[error("{backend}: rate limited: {message}")]
    RateLimited {
        backend: String,
        retry_after: Option<Duration>,
        quota_exhausted: bool,
        message: String,
    },

    #[error("{backend}: request rejected (HTTP {status}): {message}")]
    Rejected {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("{backend}: not configured: {message}")]
    NotConfigured { backend: String, message: String },

    #[error("{backend}: temporarily unavailable (circuit open)")]
    Unavailable { backend: String },

    #[error("{backend}: returned an empty response")]
    EmptyResponse { backend: String },
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Timeout { .. }
            | BackendError::Connection { .. }
            | BackendError::Server { .. }
            | BackendError::InvalidResponse { .. }
            | BackendError::Process { .. } => ErrorKind::Transport,
            BackendError::RateLimited { .. } => ErrorKind::RateLimited,
            BackendError::Rejected { .. } => ErrorKind::PermanentBackend,
            BackendError::NotConfigured { .. } | BackendError::Unavailable { .. } => {
                ErrorKind::BackendUnavailable
            }
            BackendError::EmptyResponse { .. } => ErrorKind::EmptyOutput,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::RateLimited {
                quota_exhausted, ..
            } => !quota_exhausted,
            other => other.kind() == ErrorKind::Transport,
        }
    }

    pub fn backend(&self) -> &str {
        match self {
            BackendError::Timeout { backend, .. }
            | BackendError::Connection { backend, .. }
            | BackendError::Server { backend, .. }
            | BackendError::InvalidResponse { backend, .. }
            | BackendError::Process { backend, .. }
            | BackendError::RateLimited { backend, .. }
            | BackendError::Rejected { backend, .. }
            | BackendError::NotConfigured { backend, .. }
            | BackendError::Unavailable { backend }
            | BackendError::EmptyResponse { backend } => backend,
        }
    }
}
