use crate::backend::{
    Backend, BackendError, BackendKind, BackendState, GuardedBackend, LocalBackend, RemoteBackend,
    RetryPolicy, Sleeper, ThreadSleeper,
};
use crate::config::PipelineConfig;
use crate::error::{ErrorKind, TransformError};
use crate::lang::{is_trivial, AdapterRegistry, LanguageAdapter};
use crate::pipeline::hybrid::{apply_suggestions, request_suggestions};
use crate::pipeline::monitor::ErrorMonitor;
use crate::pipeline::request::TransformationRequest;
use crate::pipeline::result::TransformationResult;
use crate::pipeline::Mode;
use crate::prompts::{ProcessingOptions, Prompt};
use crate::repair::repair;
use crate::sanitize::extract_code;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

const DEFAULT_MAX_INPUT_BYTES: usize = 100_000;
const DEFAULT_REPAIR_ATTEMPTS: u32 = 3;

/// Output of a mode before sanitizing and validation.
struct Candidate {
    code: String,
    /// Backend the code came from; `None` for purely rule-based output.
    backend: Option<BackendKind>,
    /// Raw model text that still needs sanitizing.
    raw: bool,
    changes: Vec<String>,
}

impl Candidate {
    fn generated(raw: String, backend: BackendKind) -> Self {
        Self {
            code: raw,
            backend: Some(backend),
            raw: true,
            changes: Vec::new(),
        }
    }
}

/// Availability of one backend as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendProbe {
    pub kind: BackendKind,
    pub name: String,
    pub configured: bool,
    pub circuit_open: bool,
    pub available: bool,
}

/// The transformation entry point.
///
/// One orchestrator can serve many requests, including concurrently; all
/// of them share its [`BackendState`], so circuit breaking applies across
/// the whole batch.
pub struct Orchestrator {
    mode: Mode,
    registry: AdapterRegistry,
    local: Option<Arc<dyn Backend>>,
    remote: Option<Arc<dyn Backend>>,
    state: Arc<BackendState>,
    retry: RetryPolicy,
    repair_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    monitor: Arc<ErrorMonitor>,
    max_input_bytes: usize,
    repair_attempts: u32,
    options: ProcessingOptions,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Build the real backends described by `config`.
    ///
    /// A backend that cannot be constructed (for example a missing API key)
    /// is left out, which disables it as a primary and as a fallback.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut builder = Self::builder()
            .mode(config.mode)
            .state(Arc::new(BackendState::new(
                config.circuit.local.breaker_config(),
                config.circuit.remote.breaker_config(),
            )))
            .retry_policy(config.retry.policy())
            .max_input_bytes(config.limits.max_input_bytes)
            .repair_attempts(config.repair.max_attempts)
            .processing(config.processing.clone());

        if !config.local.runners.is_empty() {
            match LocalBackend::new(&config.local) {
                Ok(local) => builder = builder.local(Arc::new(local)),
                Err(err) => warn!(error = %err, "local backend disabled"),
            }
        }
        match RemoteBackend::from_config(&config.remote) {
            Ok(remote) => builder = builder.remote(Arc::new(remote)),
            Err(err) => info!(error = %err, "remote backend disabled"),
        }
        builder.build()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn state(&self) -> &Arc<BackendState> {
        &self.state
    }

    pub fn monitor(&self) -> &Arc<ErrorMonitor> {
        &self.monitor
    }

    /// Transform one request. Never panics on backend or validation failure;
    /// every outcome is a [`TransformationResult`].
    pub fn transform(&self, request: &TransformationRequest) -> TransformationResult {
        let span = info_span!(
            "transform",
            file = request.file_path(),
            language = request.language(),
            session = request.session_id().unwrap_or("-"),
            fingerprint = %request.fingerprint(),
            mode = %self.mode,
        );
        let _enter = span.enter();
        let code = request.code();

        if code.len() > self.max_input_bytes {
            let detail = format!(
                "input is {} bytes, limit is {}",
                code.len(),
                self.max_input_bytes
            );
            return self.fail(request, ErrorKind::InputTooLarge, detail, true, Vec::new());
        }
        if is_trivial(code) {
            return TransformationResult::succeeded(
                code.to_string(),
                true,
                vec!["File is empty".to_string()],
                Vec::new(),
                None,
            );
        }
        let Some(adapter) = self.registry.get(request.language()) else {
            let detail = format!("no language adapter for '{}'", request.language());
            return self.fail(request, ErrorKind::UnsupportedLanguage, detail, true, Vec::new());
        };
        let adapter = adapter.as_ref();
        let mut warnings = Vec::new();

        let (original_valid, working) = match adapter.validate_syntax(code) {
            Ok(()) => (true, code.to_string()),
            Err(err) => {
                warnings.push(format!("Original code validation: {}", err.message));
                let working = self.repair_original(adapter, request, &err.message, &mut warnings);
                (false, working)
            }
        };

        let candidate = match self.mode {
            Mode::Hybrid => Ok(self.run_hybrid(adapter, &working, request, &mut warnings)),
            Mode::Local => self.run_local(adapter, &working, request, &mut warnings),
            Mode::Remote => self.run_remote(adapter, &working, request),
        };
        match candidate {
            Ok(candidate) => self.finish(adapter, request, candidate, original_valid, warnings),
            Err(err) => {
                let kind = err.kind();
                self.fail(request, kind, err.to_string(), original_valid, warnings)
            }
        }
    }

    /// Report what each backend slot holds and whether it would be called.
    pub fn probe(&self) -> Vec<BackendProbe> {
        [
            (BackendKind::Local, self.local.as_deref()),
            (BackendKind::Remote, self.remote.as_deref()),
        ]
        .into_iter()
        .map(|(kind, backend)| {
            let circuit_open = self.state.is_open(kind);
            match backend {
                Some(backend) => BackendProbe {
                    kind,
                    name: backend.name().to_string(),
                    configured: true,
                    circuit_open,
                    available: backend.test_connection(),
                },
                None => BackendProbe {
                    kind,
                    name: kind.to_string(),
                    configured: false,
                    circuit_open,
                    available: false,
                },
            }
        })
        .collect()
    }

    fn guard<'a>(&'a self, backend: &'a dyn Backend, policy: &'a RetryPolicy) -> GuardedBackend<'a> {
        GuardedBackend::new(backend, &self.state, policy, self.sleeper.as_ref())
    }

    fn backend(&self, kind: BackendKind) -> Option<&dyn Backend> {
        match kind {
            BackendKind::Local => self.local.as_deref(),
            BackendKind::Remote => self.remote.as_deref(),
        }
    }

    /// First configured backend with a closed circuit, in mode preference order.
    fn primary_available(&self) -> Option<&dyn Backend> {
        let order: &[BackendKind] = match self.mode {
            Mode::Hybrid | Mode::Local => &[BackendKind::Local, BackendKind::Remote],
            Mode::Remote => &[BackendKind::Remote],
        };
        order
            .iter()
            .filter_map(|kind| self.backend(*kind))
            .find(|backend| !self.state.is_open(backend.kind()))
    }

    /// The request's model override only applies to the mode's own backend.
    fn model_for<'r>(&self, kind: BackendKind, request: &'r TransformationRequest) -> Option<&'r str> {
        if self.mode == Mode::Local && kind == BackendKind::Remote {
            None
        } else {
            request.model()
        }
    }

    fn repair_original(
        &self,
        adapter: &dyn LanguageAdapter,
        request: &TransformationRequest,
        error: &str,
        warnings: &mut Vec<String>,
    ) -> String {
        let code = request.code();
        let Some(backend) = self.primary_available() else {
            debug!("no backend available to repair the original code");
            return code.to_string();
        };
        let guarded = self.guard(backend, &self.repair_policy);
        let outcome = repair(
            &guarded,
            adapter,
            code,
            error,
            code,
            self.repair_attempts,
            self.model_for(backend.kind(), request),
        );
        if outcome.repaired {
            warnings.push(format!(
                "Auto-fixed syntax error in original code after {} attempt(s)",
                outcome.attempt_count()
            ));
            outcome.code
        } else {
            debug!(attempts = outcome.attempt_count(), "original code left unrepaired");
            code.to_string()
        }
    }

    fn run_hybrid(
        &self,
        adapter: &dyn LanguageAdapter,
        working: &str,
        request: &TransformationRequest,
        warnings: &mut Vec<String>,
    ) -> Candidate {
        let safe = adapter.apply_safe_transform(working);
        let mut changes = safe.applied;
        let mut code = safe.code;
        let mut source = None;

        match self.primary_available() {
            None => warnings.push("Backend enrichment skipped: no backend available".to_string()),
            Some(backend) => {
                let guarded = self.guard(backend, &self.retry);
                let model = self.model_for(backend.kind(), request);
                match request_suggestions(&guarded, adapter.language(), &code, model) {
                    Ok(suggestions) => {
                        let enrichment = apply_suggestions(adapter, &code, &suggestions);
                        if !enrichment.changes.is_empty() {
                            source = Some(backend.kind());
                        }
                        code = enrichment.code;
                        changes.extend(enrichment.changes);
                    }
                    Err(err) => {
                        warn!(error = %err, "backend enrichment failed");
                        warnings.push(format!(
                            "Backend enrichment skipped: {}",
                            err.kind().user_message()
                        ));
                    }
                }
            }
        }

        Candidate {
            code,
            backend: source,
            raw: false,
            changes,
        }
    }

    fn run_local(
        &self,
        adapter: &dyn LanguageAdapter,
        working: &str,
        request: &TransformationRequest,
        warnings: &mut Vec<String>,
    ) -> Result<Candidate, BackendError> {
        let prompt = Prompt::transformation(adapter.language(), working, &self.options);

        let local_error = match self.local.as_deref() {
            Some(local) => {
                let guarded = self.guard(local, &self.retry);
                match guarded.invoke(&prompt.system, &prompt.user, request.model()) {
                    Ok(raw) => return Ok(Candidate::generated(raw, BackendKind::Local)),
                    Err(err) => err,
                }
            }
            None => BackendError::NotConfigured {
                backend: BackendKind::Local.to_string(),
                message: "no local backend configured".to_string(),
            },
        };

        let Some(remote) = self.remote.as_deref() else {
            return Err(local_error);
        };
        if self.state.is_open(BackendKind::Remote) {
            debug!("remote circuit open, no fallback");
            return Err(local_error);
        }

        let warning = match local_error {
            BackendError::Unavailable { .. } | BackendError::NotConfigured { .. } => {
                "Used remote fallback (local backend temporarily unavailable)"
            }
            _ => "Used remote fallback after local backend failure",
        };
        warn!(error = %local_error, "falling back to remote backend");
        warnings.push(warning.to_string());

        let guarded = self.guard(remote, &self.retry);
        let model = self.model_for(BackendKind::Remote, request);
        guarded
            .invoke(&prompt.system, &prompt.user, model)
            .map(|raw| Candidate::generated(raw, BackendKind::Remote))
    }

    fn run_remote(
        &self,
        adapter: &dyn LanguageAdapter,
        working: &str,
        request: &TransformationRequest,
    ) -> Result<Candidate, BackendError> {
        let remote = self
            .remote
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured {
                backend: BackendKind::Remote.to_string(),
                message: "no remote backend configured".to_string(),
            })?;
        let prompt = Prompt::transformation(adapter.language(), working, &self.options);
        self.guard(remote, &self.retry)
            .invoke(&prompt.system, &prompt.user, request.model())
            .map(|raw| Candidate::generated(raw, BackendKind::Remote))
    }

    /// Sanitize, validate and if needed repair the candidate.
    fn finish(
        &self,
        adapter: &dyn LanguageAdapter,
        request: &TransformationRequest,
        candidate: Candidate,
        original_valid: bool,
        mut warnings: Vec<String>,
    ) -> TransformationResult {
        let code = if candidate.raw {
            extract_code(&candidate.code, adapter.code_shape(), adapter.language())
        } else {
            candidate.code
        };
        if is_trivial(&code) {
            return self.fail(
                request,
                ErrorKind::EmptyOutput,
                "no code left after sanitizing the backend reply".to_string(),
                original_valid,
                warnings,
            );
        }

        let error = match adapter.validate_syntax(&code) {
            Ok(()) => {
                info!(changes = candidate.changes.len(), "transformation succeeded");
                return TransformationResult::succeeded(
                    code,
                    original_valid,
                    warnings,
                    candidate.changes,
                    candidate.backend,
                );
            }
            Err(err) => err,
        };
        warnings.push(format!("Transformed code validation: {}", error.message));

        // The unrepaired original came back as is and has already been through repair.
        if !original_valid && code.trim() == request.code().trim() {
            debug!("candidate is the unrepaired original, skipping a second repair loop");
            return self.fail(
                request,
                ErrorKind::SyntaxInvalid,
                error.message,
                original_valid,
                warnings,
            );
        }

        let backend = candidate
            .backend
            .and_then(|kind| self.backend(kind))
            .or_else(|| self.primary_available());
        let Some(backend) = backend else {
            warnings.push(format!(
                "Auto-repair failed after 0 attempt(s): {}",
                error.message
            ));
            return self.fail(
                request,
                ErrorKind::SyntaxInvalid,
                error.message,
                original_valid,
                warnings,
            );
        };

        let guarded = self.guard(backend, &self.repair_policy);
        let outcome = repair(
            &guarded,
            adapter,
            &code,
            &error.message,
            request.code(),
            self.repair_attempts,
            self.model_for(backend.kind(), request),
        );
        if outcome.repaired {
            warnings.push(format!(
                "Auto-fixed syntax error in transformed code after {} attempt(s)",
                outcome.attempt_count()
            ));
            info!(attempts = outcome.attempt_count(), "transformation succeeded after repair");
            return TransformationResult::succeeded(
                outcome.code,
                original_valid,
                warnings,
                candidate.changes,
                Some(backend.kind()),
            );
        }

        let detail = match &outcome.backend_error {
            Some(err) => format!("{} (repair stopped: {err})", outcome.last_error),
            None => outcome.last_error.clone(),
        };
        warnings.push(format!(
            "Auto-repair failed after {} attempt(s): {}",
            outcome.attempt_count(),
            outcome.last_error
        ));
        self.fail(request, ErrorKind::SyntaxInvalid, detail, original_valid, warnings)
    }

    fn fail(
        &self,
        request: &TransformationRequest,
        kind: ErrorKind,
        detail: String,
        original_valid: bool,
        warnings: Vec<String>,
    ) -> TransformationResult {
        self.monitor
            .record(kind, &detail, request.session_id(), request.file_path());
        TransformationResult::failed(
            request.code(),
            TransformError::new(kind, detail),
            original_valid,
            warnings,
        )
    }
}

/// Builder for [`Orchestrator`]; every setting has a default.
pub struct OrchestratorBuilder {
    mode: Mode,
    registry: AdapterRegistry,
    local: Option<Arc<dyn Backend>>,
    remote: Option<Arc<dyn Backend>>,
    state: Option<Arc<BackendState>>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    monitor: Option<Arc<ErrorMonitor>>,
    max_input_bytes: usize,
    repair_attempts: u32,
    options: ProcessingOptions,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            registry: AdapterRegistry::with_defaults(),
            local: None,
            remote: None,
            state: None,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            monitor: None,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            repair_attempts: DEFAULT_REPAIR_ATTEMPTS,
            options: ProcessingOptions::default(),
        }
    }
}

impl OrchestratorBuilder {
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn local(mut self, backend: Arc<dyn Backend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn remote(mut self, backend: Arc<dyn Backend>) -> Self {
        self.remote = Some(backend);
        self
    }

    /// Share breaker state with other orchestrators.
    pub fn state(mut self, state: Arc<BackendState>) -> Self {
        self.state = Some(state);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn monitor(mut self, monitor: Arc<ErrorMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn max_input_bytes(mut self, max: usize) -> Self {
        self.max_input_bytes = max;
        self
    }

    pub fn repair_attempts(mut self, attempts: u32) -> Self {
        self.repair_attempts = attempts;
        self
    }

    pub fn processing(mut self, options: ProcessingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            mode: self.mode,
            registry: self.registry,
            local: self.local,
            remote: self.remote,
            state: self.state.unwrap_or_default(),
            retry: self.retry,
            repair_policy: RetryPolicy::single_attempt(),
            sleeper: self.sleeper,
            monitor: self.monitor.unwrap_or_default(),
            max_input_bytes: self.max_input_bytes,
            repair_attempts: self.repair_attempts,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Canned {
        kind: BackendKind,
        replies: Mutex<Vec<Result<String, BackendError>>>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(kind: BackendKind, mut replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                kind,
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Backend for Canned {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn name(&self) -> &str {
            self.kind.as_str()
        }

        fn invoke(&self, _: &str, _: &str, _: Option<&str>) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies.lock().unwrap().pop().unwrap_or_else(|| {
                Err(BackendError::Rejected {
                    backend: self.kind.to_string(),
                    status: 400,
                    message: "script exhausted".into(),
                })
            })
        }

        fn test_connection(&self) -> bool {
            true
        }
    }

    fn request(code: &str) -> TransformationRequest {
        TransformationRequest::new(code, "python").with_file_path("t.py")
    }

    #[test]
    fn oversized_input_is_rejected_before_any_call() {
        let remote = Canned::new(BackendKind::Remote, vec![]);
        let orchestrator = Orchestrator::builder()
            .mode(Mode::Remote)
            .remote(remote.clone())
            .max_input_bytes(4)
            .build();

        let result = orchestrator.transform(&request("x = 12345"));
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::InputTooLarge));
        assert_eq!(result.final_code, "x = 12345");
        assert_eq!(remote.calls(), 0);
    }

    #[test]
    fn unsupported_language_is_rejected() {
        let orchestrator = Orchestrator::builder().build();
        let result = orchestrator.transform(&TransformationRequest::new("x", "cobol"));
        assert_eq!(result.error_kind(), Some(ErrorKind::UnsupportedLanguage));
        assert_eq!(result.final_code, "x");
    }

    #[test]
    fn remote_mode_sanitizes_candidate() {
        let remote = Canned::new(
            BackendKind::Remote,
            vec![Ok("Here is the refactored code:\n```python\ndef f(x):\n    return x * 2\n```".into())],
        );
        let orchestrator = Orchestrator::builder()
            .mode(Mode::Remote)
            .remote(remote.clone())
            .build();

        let result = orchestrator.transform(&request("def f(x):\n    return x + x\n"));
        assert!(result.success);
        assert_eq!(result.final_code, "def f(x):\n    return x * 2");
        assert_eq!(result.backend, Some(BackendKind::Remote));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn remote_mode_without_backend_is_unavailable() {
        let orchestrator = Orchestrator::builder().mode(Mode::Remote).build();
        let result = orchestrator.transform(&request("x = 1\n"));
        assert_eq!(result.error_kind(), Some(ErrorKind::BackendUnavailable));
        assert_eq!(orchestrator.monitor().stats().total, 1);
    }

    #[test]
    fn empty_reply_is_empty_output() {
        let remote = Canned::new(BackendKind::Remote, vec![Ok("```python\n```".into())]);
        let orchestrator = Orchestrator::builder()
            .mode(Mode::Remote)
            .remote(remote)
            .build();
        let result = orchestrator.transform(&request("x = 1\n"));
        assert_eq!(result.error_kind(), Some(ErrorKind::EmptyOutput));
        assert_eq!(result.final_code, "x = 1\n");
    }

    #[test]
    fn hybrid_without_backends_applies_safe_rules() {
        let orchestrator = Orchestrator::builder().build();
        let result = orchestrator.transform(&request("if flag == True:\n    run()\n"));
        assert!(result.success);
        assert_eq!(result.final_code, "if flag:\n    run()\n");
        assert_eq!(result.changes.len(), 1);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.starts_with("Backend enrichment skipped")));
    }

    #[test]
    fn hybrid_applies_backend_suggestions() {
        let local = Canned::new(
            BackendKind::Local,
            vec![Ok(r#"{"naming_map": {"n": "count"}, "docstrings": {}}"#.into())],
        );
        let orchestrator = Orchestrator::builder().local(local).build();
        let result = orchestrator.transform(&request("n = 1\nprint(n)\n"));
        assert!(result.success);
        assert_eq!(result.final_code, "count = 1\nprint(count)\n");
        assert_eq!(result.backend, Some(BackendKind::Local));
    }

    #[test]
    fn probe_reports_slots() {
        let orchestrator = Orchestrator::builder()
            .local(Canned::new(BackendKind::Local, vec![]))
            .build();
        let probes = orchestrator.probe();
        assert_eq!(probes.len(), 2);
        assert!(probes[0].configured && probes[0].available);
        assert!(!probes[1].configured);
    }
}
