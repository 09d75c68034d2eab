use refactor_guard::backend::BackendKind;
use refactor_guard::config::{load_from_path, ConfigError, RunnerConfig};
use refactor_guard::{ErrorKind, Mode, Orchestrator, TransformationRequest};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_file_and_builds_orchestrator() {
    let file = write_config(
        r#"
mode = "remote"

[remote]
api_key_env = "REFACTOR_GUARD_TEST_KEY_THAT_IS_NEVER_SET"

[local]
runners = [{ kind = "command", program = "cat" }]

[circuit.remote]
failure_threshold = 2
cooldown_secs = 30

[repair]
max_attempts = 2
"#,
    );

    let config = load_from_path(file.path()).unwrap();
    assert_eq!(config.mode, Mode::Remote);
    assert_eq!(config.repair.max_attempts, 2);
    assert_eq!(
        config.local.runners,
        vec![RunnerConfig::Command {
            program: "cat".to_string(),
            args: Vec::new(),
        }]
    );
    let breaker = config.circuit.remote.breaker_config();
    assert_eq!(breaker.failure_threshold, 2);
    assert_eq!(breaker.cooldown, Duration::from_secs(30));
    assert_eq!(config.circuit.local.failure_threshold, 3);

    let orchestrator = Orchestrator::from_config(&config);
    let probes = orchestrator.probe();
    let remote = probes.iter().find(|p| p.kind == BackendKind::Remote).unwrap();
    assert!(!remote.configured);

    let result = orchestrator.transform(&TransformationRequest::new("x = 1\n", "python"));
    assert_eq!(result.error_kind(), Some(ErrorKind::BackendUnavailable));
    assert_eq!(result.final_code, "x = 1\n");
}

#[test]
fn invalid_values_report_path_and_field() {
    let file = write_config("[repair]\nmax_attempts = 0\n");

    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { path: Some(_), .. }));
    assert!(err.to_string().contains("repair.max_attempts"));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("mode = [");
    let err = load_from_path(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}
