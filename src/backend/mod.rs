//! Generative backends and the machinery that keeps calling them safe.
//!
//! A [`Backend`] is one inference service. [`GuardedBackend`] wraps it with
//! the circuit breaker and the retry policy, recording exactly one success
//! or failure per logical call.

pub mod circuit;
pub mod errors;
pub mod local;
pub mod models;
pub mod remote;
pub mod retry;

pub use circuit::{BackendState, BreakerConfig, BreakerSnapshot, CircuitBreaker, Clock, ManualClock, SystemClock};
pub use errors::BackendError;
pub use local::LocalBackend;
pub use remote::RemoteBackend;
pub use retry::{invoke_with_retry, RetryPolicy, Sleeper, ThreadSleeper};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Which breaker a backend reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generative text backend.
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Label for logs and errors.
    fn name(&self) -> &str;

    /// Run one prompt. Implementations apply their own hard timeout.
    fn invoke(
        &self,
        system: &str,
        user: &str,
        model_override: Option<&str>,
    ) -> Result<String, BackendError>;

    /// Cheap availability probe.
    fn test_connection(&self) -> bool;
}

/// A backend behind its circuit breaker and retry policy.
pub struct GuardedBackend<'a> {
    inner: &'a dyn Backend,
    state: &'a BackendState,
    policy: &'a RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> GuardedBackend<'a> {
    pub fn new(
        inner: &'a dyn Backend,
        state: &'a BackendState,
        policy: &'a RetryPolicy,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        Self {
            inner,
            state,
            policy,
            sleeper,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.state.is_open(self.inner.kind())
    }
}

impl Backend for GuardedBackend<'_> {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn invoke(
        &self,
        system: &str,
        user: &str,
        model_override: Option<&str>,
    ) -> Result<String, BackendError> {
        let kind = self.inner.kind();
        if self.state.is_open(kind) {
            debug!(backend = self.inner.name(), "circuit open, skipping call");
            return Err(BackendError::Unavailable {
                backend: self.inner.name().to_string(),
            });
        }

        let result = invoke_with_retry(
            self.inner,
            self.policy,
            self.sleeper,
            system,
            user,
            model_override,
        );
        match &result {
            Ok(_) => self.state.record_success(kind),
            Err(_) => self.state.record_failure(kind),
        }
        result
    }

    fn test_connection(&self) -> bool {
        self.inner.test_connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct AlwaysDown {
        calls: AtomicU32,
    }

    impl Backend for AlwaysDown {
        fn kind(&self) -> BackendKind {
            BackendKind::Local
        }

        fn name(&self) -> &str {
            "down"
        }

        fn invoke(&self, _: &str, _: &str, _: Option<&str>) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::Connection {
                backend: "down".into(),
                message: "refused".into(),
            })
        }

        fn test_connection(&self) -> bool {
            false
        }
    }

    #[test]
    fn open_circuit_short_circuits_calls() {
        let backend = AlwaysDown {
            calls: AtomicU32::new(0),
        };
        let state = BackendState::with_clock(
            BreakerConfig::local_default(),
            BreakerConfig::remote_default(),
            Arc::new(ManualClock::new()),
        );
        let policy = RetryPolicy::single_attempt();
        let guarded = GuardedBackend::new(&backend, &state, &policy, &ThreadSleeper);

        for _ in 0..3 {
            assert!(guarded.invoke("s", "u", None).is_err());
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert!(!guarded.is_available());

        let err = guarded.invoke("s", "u", None).unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }
}
