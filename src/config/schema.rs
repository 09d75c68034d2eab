use crate::backend::circuit::BreakerConfig;
use crate::backend::retry::RetryPolicy;
use crate::pipeline::Mode;
use crate::prompts::ProcessingOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Largest accepted value for `repair.max_attempts`.
const MAX_REPAIR_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: Mode,
    pub limits: LimitsConfig,
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    pub circuit: CircuitConfig,
    pub retry: RetryConfig,
    pub repair: RepairConfig,
    pub processing: ProcessingOptions,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.limits.max_input_bytes == 0 {
            issues.push(ValidationIssue::Zero {
                field: "limits.max_input_bytes",
            });
        }

        if self.remote.endpoint.trim().is_empty() {
            issues.push(ValidationIssue::Empty {
                field: "remote.endpoint",
            });
        }
        if self.remote.model.trim().is_empty() {
            issues.push(ValidationIssue::Empty {
                field: "remote.model",
            });
        }
        if self.remote.timeout_secs == 0 {
            issues.push(ValidationIssue::Zero {
                field: "remote.timeout_secs",
            });
        }

        if self.local.model.trim().is_empty() {
            issues.push(ValidationIssue::Empty {
                field: "local.model",
            });
        }
        if self.local.timeout_secs == 0 {
            issues.push(ValidationIssue::Zero {
                field: "local.timeout_secs",
            });
        }
        if self.mode == Mode::Local && self.local.runners.is_empty() {
            issues.push(ValidationIssue::Invalid {
                field: "local.runners",
                message: "local mode needs at least one runner".to_string(),
            });
        }
        for runner in &self.local.runners {
            match runner {
                RunnerConfig::Ollama { endpoint } | RunnerConfig::OpenAiCompatible { endpoint } => {
                    if endpoint.trim().is_empty() {
                        issues.push(ValidationIssue::Empty {
                            field: "local.runners.endpoint",
                        });
                    }
                }
                RunnerConfig::Command { program, .. } => {
                    if program.trim().is_empty() {
                        issues.push(ValidationIssue::Empty {
                            field: "local.runners.program",
                        });
                    }
                }
            }
        }

        for (field, breaker) in [
            ("circuit.local", &self.circuit.local),
            ("circuit.remote", &self.circuit.remote),
        ] {
            if breaker.failure_threshold == 0 {
                issues.push(ValidationIssue::Invalid {
                    field,
                    message: "failure_threshold must be at least 1".to_string(),
                });
            }
            if breaker.cooldown_secs == 0 {
                issues.push(ValidationIssue::Invalid {
                    field,
                    message: "cooldown_secs must be at least 1".to_string(),
                });
            }
        }

        if self.retry.max_attempts == 0 {
            issues.push(ValidationIssue::Zero {
                field: "retry.max_attempts",
            });
        }
        if self.retry.multiplier < 1.0 {
            issues.push(ValidationIssue::Invalid {
                field: "retry.multiplier",
                message: format!("must be >= 1.0, got {}", self.retry.multiplier),
            });
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            issues.push(ValidationIssue::Invalid {
                field: "retry.max_backoff_ms",
                message: "must not be smaller than initial_backoff_ms".to_string(),
            });
        }

        if self.repair.max_attempts == 0 || self.repair.max_attempts > MAX_REPAIR_ATTEMPTS {
            issues.push(ValidationIssue::Invalid {
                field: "repair.max_attempts",
                message: format!(
                    "must be between 1 and {MAX_REPAIR_ATTEMPTS}, got {}",
                    self.repair.max_attempts
                ),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_input_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 100_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub referer: String,
    pub title: String,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// API key from the environment; `None` when unset or blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "deepseek/deepseek-chat".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            timeout_secs: 180,
            referer: "http://localhost:8000".to_string(),
            title: "refactor-guard".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    /// Tried in order; the first runner producing output wins.
    pub runners: Vec<RunnerConfig>,
}

impl LocalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model: "deepseek-coder:6.7b".to_string(),
            timeout_secs: 300,
            temperature: 0.2,
            runners: vec![
                RunnerConfig::Ollama {
                    endpoint: "http://localhost:11434".to_string(),
                },
                RunnerConfig::OpenAiCompatible {
                    endpoint: "http://localhost:1234".to_string(),
                },
                RunnerConfig::Command {
                    program: "ollama".to_string(),
                    args: vec!["run".to_string(), "{model}".to_string()],
                },
            ],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunnerConfig {
    /// Ollama HTTP API (`/api/generate`).
    Ollama { endpoint: String },
    /// Local OpenAI-compatible server such as LM Studio (`/v1/chat/completions`).
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible { endpoint: String },
    /// Subprocess reading the prompt on stdin; `{model}` in args is substituted.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl RunnerConfig {
    pub fn label(&self) -> String {
        match self {
            RunnerConfig::Ollama { endpoint } => format!("ollama@{endpoint}"),
            RunnerConfig::OpenAiCompatible { endpoint } => format!("openai-compatible@{endpoint}"),
            RunnerConfig::Command { program, .. } => format!("command:{program}"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct CircuitConfig {
    pub local: BreakerSettings,
    pub remote: BreakerSettings,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            local: BreakerSettings {
                failure_threshold: 3,
                cooldown_secs: 180,
            },
            remote: BreakerSettings {
                failure_threshold: 5,
                cooldown_secs: 300,
            },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown_secs: u64,
}

impl BreakerSettings {
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
    pub rate_limit_base_secs: u64,
    pub rate_limit_step_secs: u64,
    pub max_rate_limit_wait_secs: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            rate_limit_base: Duration::from_secs(self.rate_limit_base_secs),
            rate_limit_step: Duration::from_secs(self.rate_limit_step_secs),
            max_rate_limit_wait: Duration::from_secs(self.max_rate_limit_wait_secs),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 2_000,
            multiplier: 2.0,
            max_backoff_ms: 30_000,
            rate_limit_base_secs: 60,
            rate_limit_step_secs: 30,
            max_rate_limit_wait_secs: 300,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RepairConfig {
    pub max_attempts: u32,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Empty {
        field: &'static str,
    },
    Zero {
        field: &'static str,
    },
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Empty { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::Zero { field } => write!(f, "'{field}' must be greater than zero"),
            ValidationIssue::Invalid { field, message } => write!(f, "'{field}' {message}"),
        }
    }
}
