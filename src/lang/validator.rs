//! Syntax validation.
//!
//! A source is valid when its parse tree contains no ERROR and no MISSING
//! nodes. Failures carry every error location plus a one-line message that
//! is suitable for feeding back to a model in a correction prompt.

use crate::lang::language::Language;
use crate::lang::parser::{ErrorNode, ParsedSource};
use crate::pool;
use std::fmt;
use thiserror::Error;

/// Bytes of source shown on each side of an error location.
const CONTEXT_RADIUS: usize = 20;

/// Location of an error node in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub byte_start: usize,
    pub byte_end: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, in bytes.
    pub column: usize,
    pub context: String,
    /// Token the parser expected but did not find.
    pub missing: Option<String>,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.missing {
            Some(token) => write!(
                f,
                "line {}, column {}: missing `{}`",
                self.line, self.column, token
            ),
            None => write!(
                f,
                "line {}, column {}: syntax error near `{}`",
                self.line, self.column, self.context
            ),
        }
    }
}

/// A failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyntaxError {
    pub language: Language,
    pub message: String,
    pub locations: Vec<ErrorLocation>,
}

impl SyntaxError {
    fn from_locations(language: Language, locations: Vec<ErrorLocation>) -> Self {
        let mut message = match locations.first() {
            Some(first) => first.to_string(),
            None => "syntax error".to_string(),
        };
        if locations.len() > 1 {
            message.push_str(&format!(" (and {} more)", locations.len() - 1));
        }
        Self {
            language,
            message,
            locations,
        }
    }

    fn parser_failure(language: Language, detail: impl fmt::Display) -> Self {
        Self {
            language,
            message: format!("parser failure: {detail}"),
            locations: Vec::new(),
        }
    }
}

/// Empty or whitespace-only input.
pub fn is_trivial(source: &str) -> bool {
    source.trim().is_empty()
}

/// Validate that source code has no syntax errors.
///
/// Trivial input is valid.
pub fn validate_syntax(language: Language, source: &str) -> Result<(), SyntaxError> {
    if is_trivial(source) {
        return Ok(());
    }

    let locations = pool::with_parser(language, |parser| {
        parser
            .parse_with_source(source)
            .map(|parsed| collect_errors(&parsed))
    })
    .and_then(|inner| inner)
    .map_err(|e| SyntaxError::parser_failure(language, e))?;

    if locations.is_empty() {
        return Ok(());
    }

    let mut error = SyntaxError::from_locations(language, locations);
    if language == Language::Rust {
        refine_with_syn(source, &mut error);
    }
    Err(error)
}

/// Collect all error locations from a parsed source.
pub fn collect_errors(parsed: &ParsedSource<'_>) -> Vec<ErrorLocation> {
    parsed
        .error_nodes()
        .iter()
        .map(|node| locate(parsed.source, node))
        .collect()
}

fn locate(source: &str, node: &ErrorNode) -> ErrorLocation {
    let start = floor_char_boundary(source, node.byte_start.saturating_sub(CONTEXT_RADIUS));
    let end = floor_char_boundary(source, (node.byte_end + CONTEXT_RADIUS).min(source.len()));
    let context = source
        .get(start..end)
        .unwrap_or("")
        .trim()
        .replace('\n', "\\n");

    ErrorLocation {
        byte_start: node.byte_start,
        byte_end: node.byte_end,
        line: node.start_point.row + 1,
        column: node.start_point.column + 1,
        context,
        missing: node.missing.clone(),
    }
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// syn reports Rust errors in compiler terms ("expected `;`"), which models
/// fix more reliably than a raw error-node location.
fn refine_with_syn(source: &str, error: &mut SyntaxError) {
    let Err(syn_error) = syn::parse_file(source) else {
        return;
    };
    let Some(first) = error.locations.first() else {
        return;
    };
    let mut message = format!("line {}, column {}: {}", first.line, first.column, syn_error);
    if error.locations.len() > 1 {
        message.push_str(&format!(" (and {} more)", error.locations.len() - 1));
    }
    error.message = message;
}
