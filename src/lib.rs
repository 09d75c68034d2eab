//! Refactor Guard: resilient LLM-backed code transformation
//!
//! Sends source code to a local or remote language model for refactoring and
//! refuses to hand back anything that does not parse. Every candidate is
//! sanitized, validated with a tree-sitter grammar and, when broken, fed back
//! through a bounded repair loop. Failing backends are isolated by per-backend
//! circuit breakers so a batch degrades instead of stalling.
//!
//! # Architecture
//!
//! [`Orchestrator::transform`] is the single entry point. It produces a
//! candidate in one of three [`Mode`]s:
//!
//! - **Hybrid**: deterministic ast-grep rewrites plus renames and docs the
//!   backend suggests, each validated before it is kept
//! - **Local**: local inference with remote fallback
//! - **Remote**: remote inference only
//!
//! # Guarantees
//!
//! - A successful result always parses in the request's language
//! - A failed result always carries the untouched input
//! - Repair never exceeds its attempt bound
//! - Backend errors are classified into a stable [`ErrorKind`] taxonomy
//!
//! # Example
//!
//! ```no_run
//! use refactor_guard::{Mode, Orchestrator, TransformationRequest};
//! use std::path::Path;
//!
//! let orchestrator = Orchestrator::builder().mode(Mode::Hybrid).build();
//! let request = TransformationRequest::for_file(Path::new("app.py"), "if ok == True:\n    run()\n", "python");
//!
//! let result = orchestrator.transform(&request);
//! if result.success {
//!     println!("{}", result.final_code);
//! } else if let Some(error) = &result.error {
//!     eprintln!("{error}");
//! }
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod edit;
pub mod error;
pub mod lang;
pub mod pipeline;
pub mod pool;
pub mod prompts;
pub mod repair;
pub mod sanitize;
pub mod sg;

// Re-exports
pub use backend::{
    Backend, BackendError, BackendKind, BackendState, BreakerConfig, CircuitBreaker, LocalBackend,
    RemoteBackend, RetryPolicy,
};
pub use config::{load_from_path, load_from_str, ConfigError, PipelineConfig};
pub use error::{ErrorKind, TransformError};
pub use lang::{AdapterRegistry, Language, LanguageAdapter, SyntaxError, TreeSitterAdapter};
pub use pipeline::{
    ErrorMonitor, Mode, Orchestrator, OrchestratorBuilder, TransformationRequest,
    TransformationResult,
};
pub use prompts::{ProcessingOptions, RefactorType};
pub use repair::{repair, RepairOutcome};
pub use sanitize::extract_code;
