use crate::config::schema::{PipelineConfig, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Io { .. } => self,
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config from {}: {}", path.display(), source)
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid config ({}): {}", path.display(), source),
                None => write!(f, "invalid config: {}", source),
            },
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}

/// `$HOME/.config/refactor-guard/config.toml`, when a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(".config").join("refactor-guard").join("config.toml"))
}

/// Load `path` if given, else the default location if it exists, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    if let Some(path) = path {
        return load_from_path(path);
    }
    match default_config_path() {
        Some(default) if default.is_file() => load_from_path(default),
        _ => Ok(PipelineConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RunnerConfig, ValidationIssue};
    use crate::pipeline::Mode;

    #[test]
    fn empty_input_yields_defaults() {
        let config = load_from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.mode, Mode::Hybrid);
        assert_eq!(config.circuit.local.failure_threshold, 3);
        assert_eq!(config.circuit.remote.cooldown_secs, 300);
        assert_eq!(config.limits.max_input_bytes, 100_000);
    }

    #[test]
    fn runners_deserialize_by_kind() {
        let config = load_from_str(
            r#"
mode = "local"

[local]
runners = [
  { kind = "openai_compatible", endpoint = "http://127.0.0.1:1234" },
  { kind = "command", program = "llm", args = ["-m", "{model}"] },
]
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Local);
        assert_eq!(
            config.local.runners,
            vec![
                RunnerConfig::OpenAiCompatible {
                    endpoint: "http://127.0.0.1:1234".to_string()
                },
                RunnerConfig::Command {
                    program: "llm".to_string(),
                    args: vec!["-m".to_string(), "{model}".to_string()],
                },
            ]
        );
        // Sections not mentioned keep their defaults
        assert_eq!(config.local.model, "deepseek-coder:6.7b");
    }

    #[test]
    fn validation_collects_every_issue() {
        let err = load_from_str(
            r#"
[retry]
max_attempts = 0
multiplier = 0.5

[repair]
max_attempts = 11
"#,
        )
        .unwrap_err();
        let ConfigError::Validation { source, .. } = err else {
            panic!("expected validation error");
        };
        assert_eq!(source.issues.len(), 3);
        assert!(source.issues.contains(&ValidationIssue::Zero {
            field: "retry.max_attempts"
        }));
    }

    #[test]
    fn local_mode_requires_runners() {
        let err = load_from_str("mode = \"local\"\n[local]\nrunners = []\n");
        assert!(matches!(err, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn toml_errors_carry_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "mode = [").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { path: Some(_), .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
