//! Operator-facing record of terminal failures.

use crate::backend::{Clock, SystemClock};
use crate::error::ErrorKind;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::error;

const TRACE_TARGET: &str = "refactor_guard::monitor";

/// Records kept in the recent-failure ring.
const RECENT_CAPACITY: usize = 100;
/// Window used for health checks.
const HEALTH_WINDOW: Duration = Duration::from_secs(300);
/// More failures than this inside the window means degraded.
const DEGRADED_THRESHOLD: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub at: Instant,
    pub kind: ErrorKind,
    pub detail: String,
    pub session_id: Option<String>,
    pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub total: u64,
    pub by_kind: BTreeMap<ErrorKind, u64>,
    pub recent: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    /// Failures inside the health window.
    pub recent_failures: usize,
    pub total: u64,
    pub most_common: Option<ErrorKind>,
}

#[derive(Debug, Default)]
struct MonitorInner {
    recent: VecDeque<ErrorRecord>,
    counts: BTreeMap<ErrorKind, u64>,
    sessions: HashMap<String, Vec<ErrorRecord>>,
}

/// Shared failure log. Cheap to clone behind an `Arc`.
pub struct ErrorMonitor {
    clock: Arc<dyn Clock>,
    inner: Mutex<MonitorInner>,
}

impl ErrorMonitor {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(MonitorInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure and return the message to show the user.
    pub fn record(
        &self,
        kind: ErrorKind,
        detail: &str,
        session_id: Option<&str>,
        file_path: &str,
    ) -> &'static str {
        let record = ErrorRecord {
            at: self.clock.now(),
            kind,
            detail: detail.to_string(),
            session_id: session_id.map(str::to_string),
            file_path: file_path.to_string(),
        };
        error!(
            target: TRACE_TARGET,
            kind = %kind,
            session = session_id.unwrap_or("-"),
            file = file_path,
            detail = %truncate(detail, 200),
            "transformation failed"
        );

        let mut inner = self.lock();
        *inner.counts.entry(kind).or_insert(0) += 1;
        if let Some(session) = session_id {
            inner
                .sessions
                .entry(session.to_string())
                .or_default()
                .push(record.clone());
        }
        if inner.recent.len() == RECENT_CAPACITY {
            inner.recent.pop_front();
        }
        inner.recent.push_back(record);
        kind.user_message()
    }

    pub fn stats(&self) -> MonitorStats {
        let inner = self.lock();
        MonitorStats {
            total: inner.counts.values().sum(),
            by_kind: inner.counts.clone(),
            recent: inner.recent.len(),
        }
    }

    pub fn session_errors(&self, session_id: &str) -> Vec<ErrorRecord> {
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn health(&self) -> Health {
        let now = self.clock.now();
        let inner = self.lock();
        let recent_failures = inner
            .recent
            .iter()
            .filter(|record| now.saturating_duration_since(record.at) < HEALTH_WINDOW)
            .count();
        let most_common = inner
            .counts
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(kind, _)| *kind);
        Health {
            status: if recent_failures > DEGRADED_THRESHOLD {
                HealthStatus::Degraded
            } else {
                HealthStatus::Healthy
            },
            recent_failures,
            total: inner.counts.values().sum(),
            most_common,
        }
    }

    /// Drop session records older than `max_age`.
    pub fn clear_older_than(&self, max_age: Duration) {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.sessions.retain(|_, records| {
            records.retain(|record| now.saturating_duration_since(record.at) <= max_age);
            !records.is_empty()
        });
    }
}

impl Default for ErrorMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ManualClock;

    fn monitor() -> (ErrorMonitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ErrorMonitor::with_clock(clock.clone()), clock)
    }

    #[test]
    fn records_counts_and_sessions() {
        let (monitor, _clock) = monitor();
        let message = monitor.record(ErrorKind::RateLimited, "HTTP 429", Some("s1"), "a.py");
        assert_eq!(message, ErrorKind::RateLimited.user_message());
        monitor.record(ErrorKind::RateLimited, "HTTP 429", None, "b.py");
        monitor.record(ErrorKind::Transport, "timeout", Some("s1"), "c.py");

        let stats = monitor.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind[&ErrorKind::RateLimited], 2);
        assert_eq!(monitor.session_errors("s1").len(), 2);
        assert!(monitor.session_errors("nope").is_empty());
        assert_eq!(monitor.health().most_common, Some(ErrorKind::RateLimited));
    }

    #[test]
    fn recent_ring_is_bounded() {
        let (monitor, _clock) = monitor();
        for _ in 0..150 {
            monitor.record(ErrorKind::Transport, "timeout", None, "");
        }
        let stats = monitor.stats();
        assert_eq!(stats.recent, RECENT_CAPACITY);
        assert_eq!(stats.total, 150);
    }

    #[test]
    fn degraded_only_inside_window() {
        let (monitor, clock) = monitor();
        for _ in 0..21 {
            monitor.record(ErrorKind::Transport, "timeout", None, "");
        }
        assert_eq!(monitor.health().status, HealthStatus::Degraded);

        clock.advance(Duration::from_secs(301));
        let health = monitor.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.recent_failures, 0);
    }

    #[test]
    fn clears_old_session_records() {
        let (monitor, clock) = monitor();
        monitor.record(ErrorKind::Transport, "old", Some("s1"), "");
        clock.advance(Duration::from_secs(3600));
        monitor.record(ErrorKind::Transport, "new", Some("s1"), "");
        monitor.clear_older_than(Duration::from_secs(60));

        let remaining = monitor.session_errors("s1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].detail, "new");
    }
}
