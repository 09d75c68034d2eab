//! Scripted backends and a sleeper that only records.

use refactor_guard::backend::{Backend, BackendError, BackendKind, Sleeper};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays a fixed list of replies; the last reply repeats forever.
pub struct ScriptedBackend {
    kind: BackendKind,
    replies: Vec<Result<String, BackendError>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
        assert!(!replies.is_empty());
        Arc::new(Self {
            kind,
            replies,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(kind: BackendKind, reply: impl Into<String>) -> Arc<Self> {
        Self::new(kind, vec![Ok(reply.into())])
    }

    pub fn failing(kind: BackendKind, error: BackendError) -> Arc<Self> {
        Self::new(kind, vec![Err(error)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Backend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn invoke(&self, _system: &str, _user: &str, _model: Option<&str>) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.replies.len() - 1);
        self.replies[index].clone()
    }

    fn test_connection(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub fn connection_refused(kind: BackendKind) -> BackendError {
    BackendError::Connection {
        backend: kind.to_string(),
        message: "connection refused".to_string(),
    }
}

pub fn unauthorized(kind: BackendKind) -> BackendError {
    BackendError::Rejected {
        backend: kind.to_string(),
        status: 401,
        message: "invalid api key".to_string(),
    }
}
