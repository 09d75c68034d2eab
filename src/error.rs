//! Error taxonomy shared by backends, the orchestrator and the monitor.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of every failure a transformation can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout, connection failure, 5xx, malformed response. Retried with backoff.
    Transport,
    /// Throttled by the backend. Retried after a longer wait unless the quota is spent.
    RateLimited,
    /// Authentication, authorization or request rejected. Never retried.
    PermanentBackend,
    /// Circuit open or backend not configured. Never attempted.
    BackendUnavailable,
    /// Backend answered but nothing usable was left after sanitizing.
    EmptyOutput,
    /// Produced code failed validation and could not be repaired.
    SyntaxInvalid,
    UnsupportedLanguage,
    InputTooLarge,
}

impl ErrorKind {
    /// Stable, non-technical message shown to end users.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Transport => "Request timed out or the connection failed. Please try again.",
            ErrorKind::RateLimited => "Service temporarily busy. Please try again in a few minutes.",
            ErrorKind::PermanentBackend => "Service configuration issue. Please contact support.",
            ErrorKind::BackendUnavailable => {
                "Refactoring service temporarily unavailable. Please try again later."
            }
            ErrorKind::EmptyOutput => "Refactoring model returned no usable code. Please try again.",
            ErrorKind::SyntaxInvalid => "Refactored code failed syntax validation; original code kept.",
            ErrorKind::UnsupportedLanguage => "Language is not supported.",
            ErrorKind::InputTooLarge => {
                "File is too large for processing. Please try with a smaller file."
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::PermanentBackend => "permanent_backend",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::EmptyOutput => "empty_output",
            ErrorKind::SyntaxInvalid => "syntax_invalid",
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::InputTooLarge => "input_too_large",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error attached to a failed transformation result.
///
/// `message` is the user-facing text. `detail` keeps the technical cause
/// for the error monitor and logs and is never serialized.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct TransformError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing)]
    pub detail: String,
}

impl TransformError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            detail: detail.into(),
        }
    }
}
