//! The transformation pipeline.
//!
//! [`Orchestrator::transform`] is the single entry point: it validates the
//! request, produces a candidate in the configured [`Mode`], sanitizes and
//! validates it, runs bounded repair when needed, and always returns a
//! [`TransformationResult`].

pub mod hybrid;
pub mod monitor;
pub mod orchestrator;
pub mod request;
pub mod result;

pub use hybrid::{apply_suggestions, request_suggestions, Enrichment, Suggestions};
pub use monitor::{ErrorMonitor, ErrorRecord, Health, HealthStatus, MonitorStats};
pub use orchestrator::{BackendProbe, Orchestrator, OrchestratorBuilder};
pub use request::TransformationRequest;
pub use result::TransformationResult;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How candidates are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Safe rule-based rewrites plus validated backend suggestions.
    #[default]
    Hybrid,
    /// Local inference, falling back to remote when local fails.
    Local,
    /// Remote inference only.
    Remote,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Hybrid => "hybrid",
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "hybrid" => Ok(Mode::Hybrid),
            "local" | "localonly" => Ok(Mode::Local),
            "remote" | "remoteonly" => Ok(Mode::Remote),
            other => Err(format!("unknown mode '{other}' (expected hybrid, local or remote)")),
        }
    }
}
