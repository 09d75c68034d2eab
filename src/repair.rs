//! Bounded auto-repair of syntactically invalid code.
//!
//! Each attempt sends the broken code, the validator's message and the
//! original code to a backend with a correction prompt, sanitizes the reply
//! and validates it. The loop stops at the first valid candidate, after
//! `max_attempts` invalid ones, or as soon as the backend call itself fails.

use crate::backend::{Backend, BackendError};
use crate::lang::LanguageAdapter;
use crate::prompts::Prompt;
use crate::sanitize::extract_code;
use tracing::{debug, info, warn};

const TRACE_TARGET: &str = "refactor_guard::repair";

/// One trip through the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairAttempt {
    /// 1-based.
    pub attempt: u32,
    /// Error the backend was asked to fix.
    pub error: String,
    pub candidate: String,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairOutcome {
    /// The valid candidate on success, otherwise the last candidate produced
    /// (or the input, if no candidate was produced).
    pub code: String,
    pub repaired: bool,
    pub attempts: Vec<RepairAttempt>,
    /// Validation error of `code`; empty when repaired.
    pub last_error: String,
    /// Set when a backend failure ended the loop early.
    pub backend_error: Option<BackendError>,
}

impl RepairOutcome {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

/// Ask `backend` to fix `broken` until it validates or attempts run out.
pub fn repair(
    backend: &dyn Backend,
    adapter: &dyn LanguageAdapter,
    broken: &str,
    error: &str,
    original: &str,
    max_attempts: u32,
    model: Option<&str>,
) -> RepairOutcome {
    let language = adapter.language();
    let mut current = broken.to_string();
    let mut current_error = error.to_string();
    let mut attempts = Vec::new();

    for attempt in 1..=max_attempts {
        let prompt = Prompt::correction(language, &current, &current_error, original);
        let raw = match backend.invoke(&prompt.system, &prompt.user, model) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    target: TRACE_TARGET,
                    backend = backend.name(),
                    attempt,
                    error = %err,
                    "repair aborted by backend failure"
                );
                return RepairOutcome {
                    code: current,
                    repaired: false,
                    attempts,
                    last_error: current_error,
                    backend_error: Some(err),
                };
            }
        };

        let candidate = extract_code(&raw, adapter.code_shape(), language);
        if candidate.trim().is_empty() {
            debug!(target: TRACE_TARGET, attempt, "repair produced no code");
            attempts.push(RepairAttempt {
                attempt,
                error: current_error.clone(),
                candidate,
                valid: false,
            });
            continue;
        }

        match adapter.validate_syntax(&candidate) {
            Ok(()) => {
                info!(target: TRACE_TARGET, backend = backend.name(), attempt, "repair succeeded");
                attempts.push(RepairAttempt {
                    attempt,
                    error: current_error,
                    candidate: candidate.clone(),
                    valid: true,
                });
                return RepairOutcome {
                    code: candidate,
                    repaired: true,
                    attempts,
                    last_error: String::new(),
                    backend_error: None,
                };
            }
            Err(syntax) => {
                debug!(target: TRACE_TARGET, attempt, error = %syntax, "repair candidate still invalid");
                attempts.push(RepairAttempt {
                    attempt,
                    error: current_error,
                    candidate: candidate.clone(),
                    valid: false,
                });
                current = candidate;
                current_error = syntax.message;
            }
        }
    }

    RepairOutcome {
        code: current,
        repaired: false,
        attempts,
        last_error: current_error,
        backend_error: None,
    }
}
