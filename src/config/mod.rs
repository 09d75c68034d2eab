//! Pipeline configuration: TOML schema, validation and loading.

pub mod loader;
pub mod schema;

pub use loader::{default_config_path, load_from_path, load_from_str, load_or_default, ConfigError};
pub use schema::{
    BreakerSettings, CircuitConfig, LimitsConfig, LocalConfig, PipelineConfig, RemoteConfig,
    RepairConfig, RetryConfig, RunnerConfig, ValidationError, ValidationIssue,
};
