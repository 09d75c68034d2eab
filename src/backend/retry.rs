//! Retry policy for a single logical backend call.
//!
//! Transport failures back off exponentially. Rate limits wait for the
//! provider's hint or an escalating fixed delay. Everything else, and a
//! spent quota, is returned at once.

use crate::backend::errors::BackendError;
use crate::backend::Backend;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;
use tracing::{debug, warn};

const TRACE_TARGET: &str = "refactor_guard::retry";

/// Blocking pause between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    /// Wait after the first rate-limited attempt when no hint was given.
    pub rate_limit_base: Duration,
    /// Added to the rate-limit wait for every further attempt.
    pub rate_limit_step: Duration,
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
            rate_limit_base: Duration::from_secs(60),
            rate_limit_step: Duration::from_secs(30),
            max_rate_limit_wait: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// One attempt, no waiting. Used for repair calls.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Deterministic exponential schedule for transport failures.
    pub fn transport_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_multiplier(self.multiplier)
            .with_max_interval(self.max_backoff)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Wait after the `attempt`-th (1-based) rate-limited response.
    pub fn rate_limit_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let escalating = self.rate_limit_base + self.rate_limit_step * attempt.saturating_sub(1);
        hint.unwrap_or(escalating).min(self.max_rate_limit_wait)
    }
}

/// Call `backend` until it succeeds, fails permanently, or attempts run out.
pub fn invoke_with_retry(
    backend: &dyn Backend,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    system: &str,
    user: &str,
    model: Option<&str>,
) -> Result<String, BackendError> {
    let mut transport = policy.transport_backoff();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match backend.invoke(system, user, model) {
            Ok(content) => return Ok(content),
            Err(error) => error,
        };

        if !error.is_retryable() || attempt >= max_attempts {
            if attempt > 1 {
                warn!(
                    target: TRACE_TARGET,
                    backend = backend.name(),
                    attempts = attempt,
                    error = %error,
                    "giving up on backend call"
                );
            }
            return Err(error);
        }

        let delay = match &error {
            BackendError::RateLimited { retry_after, .. } => {
                policy.rate_limit_delay(attempt, *retry_after)
            }
            _ => transport.next_backoff().unwrap_or(policy.max_backoff),
        };
        debug!(
            target: TRACE_TARGET,
            backend = backend.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying backend call"
        );
        sleeper.sleep(delay);
        attempt += 1;
    }
}
