//! ast-grep integration for pattern-based structural matching.
//!
//! Patterns use ast-grep's metavariable syntax (`$X`, `$$$ARGS`) and are
//! compiled against the grammar of the request's language.

pub mod errors;
pub mod matcher;
pub mod replacer;

pub use errors::AstGrepError;
pub use matcher::{PatternMatch, PatternMatcher};
pub use replacer::{drop_overlapping, replace_with_template, Replacement};
