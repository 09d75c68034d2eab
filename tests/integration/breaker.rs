use crate::support::{unauthorized, ScriptedBackend};
use refactor_guard::backend::{BackendKind, BackendState, BreakerConfig, ManualClock};
use refactor_guard::{ErrorKind, Mode, Orchestrator, TransformationRequest};
use std::sync::Arc;
use std::time::Duration;

fn request() -> TransformationRequest {
    TransformationRequest::new("x = 1\n", "python")
}

#[test]
fn breaker_opens_across_requests_and_recovers_after_cooldown() {
    let clock = Arc::new(ManualClock::new());
    let state = Arc::new(BackendState::with_clock(
        BreakerConfig::local_default(),
        BreakerConfig::remote_default(),
        clock.clone(),
    ));
    let remote = ScriptedBackend::failing(BackendKind::Remote, unauthorized(BackendKind::Remote));
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .state(state.clone())
        .build();

    for _ in 0..5 {
        let result = orchestrator.transform(&request());
        assert_eq!(result.error_kind(), Some(ErrorKind::PermanentBackend));
    }
    assert_eq!(remote.calls(), 5);
    assert!(state.is_open(BackendKind::Remote));

    for _ in 0..3 {
        let result = orchestrator.transform(&request());
        assert_eq!(result.error_kind(), Some(ErrorKind::BackendUnavailable));
        assert_eq!(result.final_code, "x = 1\n");
    }
    assert_eq!(remote.calls(), 5);

    clock.advance(Duration::from_secs(301));
    assert!(!state.is_open(BackendKind::Remote));
    orchestrator.transform(&request());
    assert_eq!(remote.calls(), 6);

    let stats = orchestrator.monitor().stats();
    assert_eq!(stats.total, 9);
    assert_eq!(stats.by_kind[&ErrorKind::BackendUnavailable], 3);
}

#[test]
fn orchestrators_sharing_state_share_breakers() {
    let state = Arc::new(BackendState::with_clock(
        BreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        },
        BreakerConfig::remote_default(),
        Arc::new(ManualClock::new()),
    ));
    let failing = ScriptedBackend::failing(BackendKind::Local, unauthorized(BackendKind::Local));
    let first = Orchestrator::builder()
        .mode(Mode::Local)
        .local(failing.clone())
        .state(state.clone())
        .build();
    let second = Orchestrator::builder()
        .mode(Mode::Local)
        .local(failing.clone())
        .state(state)
        .build();

    first.transform(&request());
    second.transform(&request());
    let result = first.transform(&request());

    assert_eq!(result.error_kind(), Some(ErrorKind::BackendUnavailable));
    assert_eq!(failing.calls(), 2);
}

#[test]
fn concurrent_batch_stops_calling_a_dead_backend() {
    let remote = ScriptedBackend::failing(BackendKind::Remote, unauthorized(BackendKind::Remote));
    let orchestrator = Orchestrator::builder()
        .mode(Mode::Remote)
        .remote(remote.clone())
        .state(Arc::new(BackendState::with_clock(
            BreakerConfig::local_default(),
            BreakerConfig::remote_default(),
            Arc::new(ManualClock::new()),
        )))
        .build();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..5 {
                    let result = orchestrator.transform(&request());
                    assert!(!result.success);
                    assert!(matches!(
                        result.error_kind(),
                        Some(ErrorKind::PermanentBackend | ErrorKind::BackendUnavailable)
                    ));
                }
            });
        }
    });

    // Threshold plus at most one in-flight call per thread
    assert!(remote.calls() <= 5 + 8, "calls = {}", remote.calls());
    assert_eq!(orchestrator.monitor().stats().total, 40);
}
