use crate::support::{connection_refused, unauthorized, RecordingSleeper, ScriptedBackend};
use refactor_guard::backend::{BackendKind, BackendState, BreakerConfig, ManualClock};
use refactor_guard::lang::{Language, LanguageAdapter, TreeSitterAdapter};
use refactor_guard::{ErrorKind, Mode, Orchestrator, TransformationRequest};
use std::sync::Arc;
use std::time::Duration;

fn python(code: &str) -> TransformationRequest {
    TransformationRequest::new(code, "python").with_file_path("sample.py")
}

#[test]
fn broken_python_is_repaired_before_transforming() {
    let fixed = "def f(x):\n    print('x')\n    return x";
    let remote = ScriptedBackend::always(BackendKind::Remote, fixed);
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build();

    let result = orchestrator.transform(&python("def f(x):\n    print('x'\n    return x"));

    assert!(result.success, "{result:?}");
    assert!(!result.original_valid);
    assert!(result.final_valid);
    assert_eq!(result.final_code, fixed);
    let auto_fixed = result
        .warnings
        .iter()
        .filter(|w| w.to_lowercase().contains("auto-fixed syntax error"))
        .count();
    assert_eq!(auto_fixed, 1);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("Original code validation:")));
    // one repair call, one transformation call
    assert_eq!(remote.calls(), 2);
}

#[test]
fn invalid_candidate_is_repaired() {
    let remote = ScriptedBackend::new(
        BackendKind::Remote,
        vec![
            Ok("```python\ndef f(:\n    pass\n```".to_string()),
            Ok("```python\ndef f(x):\n    return x\n```".to_string()),
        ],
    );
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .build();

    let result = orchestrator.transform(&python("def f(x):\n    return x\n"));

    assert!(result.success);
    assert_eq!(result.final_code, "def f(x):\n    return x");
    assert!(result
        .warnings
        .iter()
        .any(|w| w == "Auto-fixed syntax error in transformed code after 1 attempt(s)"));
    assert_eq!(remote.calls(), 2);
}

#[test]
fn repair_stops_at_the_attempt_bound() {
    let remote = ScriptedBackend::always(BackendKind::Remote, "def f(:\n    pass");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .build();
    let input = "x = 1\n";

    let result = orchestrator.transform(&python(input));

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::SyntaxInvalid));
    assert_eq!(result.final_code, input);
    assert!(result.original_valid);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("Auto-repair failed after 3 attempt(s)")));
    assert_eq!(remote.calls(), 1 + 3);

    let tight = ScriptedBackend::always(BackendKind::Remote, "def f(:\n    pass");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(tight.clone())
        .repair_attempts(1)
        .build();
    assert!(!orchestrator.transform(&python(input)).success);
    assert_eq!(tight.calls(), 2);
}

#[test]
fn local_failure_falls_back_to_remote() {
    let local = ScriptedBackend::failing(BackendKind::Local, connection_refused(BackendKind::Local));
    let remote = ScriptedBackend::always(BackendKind::Remote, "def f(x):\n    return x * 2");
    let sleeper = Arc::new(RecordingSleeper::default());
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Local)
        .local(local.clone())
        .remote(remote.clone())
        .sleeper(sleeper.clone())
        .build();

    let result = orchestrator.transform(&python("def f(x):\n    return x + x\n"));

    assert!(result.success);
    assert_eq!(result.backend, Some(BackendKind::Remote));
    assert!(result
        .warnings
        .contains(&"Used remote fallback after local backend failure".to_string()));
    assert_eq!(local.calls(), 3);
    assert_eq!(remote.calls(), 1);
    assert_eq!(
        sleeper.slept(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
    assert_eq!(
        orchestrator
            .state()
            .breaker(BackendKind::Local)
            .snapshot()
            .consecutive_failures,
        1
    );
}

#[test]
fn open_local_circuit_goes_straight_to_remote() {
    let state = Arc::new(BackendState::with_clock(
        BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(180),
        },
        BreakerConfig::remote_default(),
        Arc::new(ManualClock::new()),
    ));
    state.record_failure(BackendKind::Local);

    let local = ScriptedBackend::always(BackendKind::Local, "unused = 1");
    let remote = ScriptedBackend::always(BackendKind::Remote, "x = 2");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Local)
        .local(local.clone())
        .remote(remote)
        .state(state)
        .build();

    let result = orchestrator.transform(&python("x = 1\n"));

    assert!(result.success);
    assert_eq!(result.final_code, "x = 2");
    assert!(result
        .warnings
        .contains(&"Used remote fallback (local backend temporarily unavailable)".to_string()));
    assert_eq!(local.calls(), 0);
}

#[test]
fn local_failure_without_remote_is_reported() {
    let local = ScriptedBackend::failing(BackendKind::Local, unauthorized(BackendKind::Local));
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Local)
        .local(local.clone())
        .build();

    let result = orchestrator.transform(&python("x = 1\n").with_session("batch-7"));

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::PermanentBackend));
    assert_eq!(result.final_code, "x = 1\n");
    assert_eq!(local.calls(), 1);

    let recorded = orchestrator.monitor().session_errors("batch-7");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, ErrorKind::PermanentBackend);
    assert_eq!(recorded[0].file_path, "sample.py");
}

#[test]
fn empty_input_needs_no_backend() {
    let remote = ScriptedBackend::always(BackendKind::Remote, "x = 1");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .build();

    let result = orchestrator.transform(&python("  \n\t\n"));

    assert!(result.success);
    assert_eq!(result.final_code, "  \n\t\n");
    assert_eq!(result.warnings, vec!["File is empty".to_string()]);
    assert_eq!(remote.calls(), 0);
}

#[test]
fn hybrid_keeps_only_valid_suggestions() {
    let reply = r#"Here you go:
{"naming_map": {"t": "total", "s": "bad name"}, "docstrings": {"add": "Add two numbers."}}"#;
    let local = ScriptedBackend::always(BackendKind::Local, reply);
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Hybrid)
        .local(local)
        .build();

    let code = "def add(a, b):\n    t = a + b\n    if t == True:\n        return t\n    return t\n";
    let result = orchestrator.transform(&python(code));

    assert!(result.success);
    assert!(result.final_code.contains("total = a + b"));
    assert!(result.final_code.contains("if total:"));
    assert!(result.final_code.contains("\"\"\"Add two numbers.\"\"\""));
    assert!(!result.final_code.contains("bad name"));
    assert_eq!(result.changes.len(), 3);
    let adapter = TreeSitterAdapter::new(Language::Python);
    assert!(adapter.validate_syntax(&result.final_code).is_ok());
}

#[test]
fn hybrid_survives_unusable_suggestions() {
    let local = ScriptedBackend::always(BackendKind::Local, "I cannot help with that.");
    let orchestrator = Orchestrator::builder().local(local).build();

    let result = orchestrator.transform(&python("ok = 1\n"));

    assert!(result.success);
    assert_eq!(result.final_code, "ok = 1\n");
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("Backend enrichment skipped")));
}

#[test]
fn open_remote_circuit_means_no_fallback() {
    let state = Arc::new(BackendState::with_clock(
        BreakerConfig::local_default(),
        BreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_secs(300),
        },
        Arc::new(ManualClock::new()),
    ));
    state.record_failure(BackendKind::Remote);

    let local = ScriptedBackend::failing(BackendKind::Local, unauthorized(BackendKind::Local));
    let remote = ScriptedBackend::always(BackendKind::Remote, "x = 2");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Local)
        .local(local.clone())
        .remote(remote.clone())
        .state(state)
        .build();

    let result = orchestrator.transform(&python("x = 1\n"));

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::PermanentBackend));
    assert_eq!(result.final_code, "x = 1\n");
    assert_eq!(local.calls(), 1);
    assert_eq!(remote.calls(), 0);
    assert!(!result
        .warnings
        .iter()
        .any(|w| w.to_lowercase().contains("fallback")));
}

#[test]
fn unrepairable_original_is_not_repaired_twice() {
    let local = ScriptedBackend::always(BackendKind::Local, "def f(:\n    pass");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Hybrid)
        .local(local.clone())
        .repair_attempts(3)
        .build();
    let input = "def f(:\n    pass\n";

    let result = orchestrator.transform(&python(input));

    assert!(!result.success);
    assert!(!result.original_valid);
    assert_eq!(result.error_kind(), Some(ErrorKind::SyntaxInvalid));
    assert_eq!(result.final_code, input);
    // three original repair attempts, one enrichment call
    assert_eq!(local.calls(), 4);
}

#[test]
fn empty_fenced_reply_is_empty_output() {
    let remote = ScriptedBackend::always(BackendKind::Remote, "```python\n```");
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .build();

    let result = orchestrator.transform(&python("x = 1\n"));

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(ErrorKind::EmptyOutput));
    assert_eq!(result.final_code, "x = 1\n");
    assert_eq!(remote.calls(), 1);
    assert!(!result
        .warnings
        .iter()
        .any(|w| w.starts_with("Transformed code validation")));
}
