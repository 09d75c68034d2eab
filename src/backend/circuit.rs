//! Per-backend circuit breaking.
//!
//! A breaker counts consecutive failures. Once the count reaches the
//! threshold the breaker opens for a cooldown window, during which callers
//! must not invoke the backend. There is no half-open probing: the first
//! `is_open` check after the window has elapsed closes the breaker and
//! zeroes the count.

use crate::backend::BackendKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Source of "now" for breaker timing.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl BreakerConfig {
    pub fn local_default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(180),
        }
    }

    pub fn remote_default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Default)]
struct BreakerInner {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub backend: BackendKind,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub open_until: Option<Instant>,
}

/// Failure counter and open window for one backend.
pub struct CircuitBreaker {
    backend: BackendKind,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(backend: BackendKind, config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            config,
            clock,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // Counters stay meaningful even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while the cooldown window is running. An expired window is
    /// cleared here, together with the failure count.
    pub fn is_open(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                inner.open_until = None;
                inner.consecutive_failures = 0;
                info!(backend = %self.backend, "circuit closed after cooldown");
                false
            }
            None => false,
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if inner.consecutive_failures >= self.config.failure_threshold {
            // Failures that land while already open push the window out
            inner.open_until = Some(now + self.config.cooldown);
            warn!(
                backend = %self.backend,
                failures = inner.consecutive_failures,
                cooldown_secs = self.config.cooldown.as_secs(),
                "circuit opened"
            );
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.open_until.is_some() || inner.consecutive_failures > 0 {
            info!(backend = %self.backend, "circuit reset after success");
        }
        inner.consecutive_failures = 0;
        inner.open_until = None;
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            backend: self.backend,
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
            open_until: inner.open_until,
        }
    }
}

/// The breakers shared by every request of one orchestrator, one per backend kind.
///
/// Pass the same `Arc<BackendState>` to every pipeline that should see the
/// same backend health.
pub struct BackendState {
    local: CircuitBreaker,
    remote: CircuitBreaker,
}

impl BackendState {
    pub fn new(local: BreakerConfig, remote: BreakerConfig) -> Self {
        Self::with_clock(local, remote, Arc::new(SystemClock))
    }

    pub fn with_clock(local: BreakerConfig, remote: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            local: CircuitBreaker::new(BackendKind::Local, local, Arc::clone(&clock)),
            remote: CircuitBreaker::new(BackendKind::Remote, remote, clock),
        }
    }

    pub fn breaker(&self, kind: BackendKind) -> &CircuitBreaker {
        match kind {
            BackendKind::Local => &self.local,
            BackendKind::Remote => &self.remote,
        }
    }

    pub fn is_open(&self, kind: BackendKind) -> bool {
        self.breaker(kind).is_open()
    }

    pub fn record_failure(&self, kind: BackendKind) {
        self.breaker(kind).record_failure();
    }

    pub fn record_success(&self, kind: BackendKind) {
        self.breaker(kind).record_success();
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new(BreakerConfig::local_default(), BreakerConfig::remote_default())
    }
}
