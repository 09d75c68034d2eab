//! Backend-suggested enrichment for hybrid mode.
//!
//! The backend never writes code here. It returns a JSON object of renames
//! and documentation strings, and each suggestion is applied as a
//! structural edit and validated on its own. A suggestion that fails to
//! apply or breaks the syntax is dropped without affecting the others.

use crate::backend::{Backend, BackendError};
use crate::lang::{Language, LanguageAdapter};
use crate::prompts::Prompt;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

const TRACE_TARGET: &str = "refactor_guard::hybrid";

/// Parsed analysis reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Suggestions {
    pub suggestions: Vec<String>,
    #[serde(alias = "rename")]
    pub naming_map: BTreeMap<String, String>,
    pub docstrings: BTreeMap<String, String>,
    pub performance_hints: Vec<String>,
}

impl Suggestions {
    /// Parse the outermost `{...}` object in `raw`, tolerating chatter and fences around it.
    pub fn parse(raw: &str) -> Option<Self> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&raw[start..=end]).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.naming_map.is_empty() && self.docstrings.is_empty()
    }
}

/// Result of applying suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub code: String,
    pub changes: Vec<String>,
    /// Suggestions that were not applied, with the reason.
    pub skipped: Vec<String>,
}

/// Ask `backend` for suggestions on `code`.
pub fn request_suggestions(
    backend: &dyn Backend,
    language: Language,
    code: &str,
    model: Option<&str>,
) -> Result<Suggestions, BackendError> {
    let prompt = Prompt::analysis(language, code);
    let raw = backend.invoke(&prompt.system, &prompt.user, model)?;
    Suggestions::parse(&raw).ok_or_else(|| BackendError::InvalidResponse {
        backend: backend.name().to_string(),
        message: "analysis reply did not contain a JSON object".to_string(),
    })
}

/// Apply renames, then documentation, keeping only edits that validate.
pub fn apply_suggestions(
    adapter: &dyn LanguageAdapter,
    code: &str,
    suggestions: &Suggestions,
) -> Enrichment {
    let mut current = code.to_string();
    let mut changes = Vec::new();
    let mut skipped = Vec::new();

    for (old, new) in &suggestions.naming_map {
        let attempt = adapter
            .rename_identifier(&current, old, new)
            .map_err(|err| err.to_string())
            .and_then(|next| keep_if_valid(adapter, next));
        match attempt {
            Ok(next) if next != current => {
                current = next;
                changes.push(format!("rename `{old}` to `{new}`"));
            }
            Ok(_) => {}
            Err(reason) => skipped.push(format!("rename `{old}`: {reason}")),
        }
    }

    for (symbol, doc) in &suggestions.docstrings {
        let attempt = adapter
            .insert_doc(&current, symbol, doc)
            .map_err(|err| err.to_string())
            .and_then(|next| keep_if_valid(adapter, next));
        match attempt {
            Ok(next) => {
                current = next;
                changes.push(format!("document `{symbol}`"));
            }
            Err(reason) => skipped.push(format!("document `{symbol}`: {reason}")),
        }
    }

    for reason in &skipped {
        debug!(target: TRACE_TARGET, %reason, "suggestion skipped");
    }
    Enrichment {
        code: current,
        changes,
        skipped,
    }
}

fn keep_if_valid(adapter: &dyn LanguageAdapter, code: String) -> Result<String, String> {
    match adapter.validate_syntax(&code) {
        Ok(()) => Ok(code),
        Err(err) => Err(format!("result failed validation: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::TreeSitterAdapter;

    #[test]
    fn parses_json_inside_chatter() {
        let raw = "Sure, here you go:\n```json\n{\"suggestions\": [\"split f\"], \"rename\": {\"x\": \"count\"}}\n```";
        let parsed = Suggestions::parse(raw).unwrap();
        assert_eq!(parsed.suggestions, vec!["split f".to_string()]);
        assert_eq!(parsed.naming_map.get("x").map(String::as_str), Some("count"));
        assert!(parsed.docstrings.is_empty());

        assert_eq!(Suggestions::parse("no json here"), None);
        assert_eq!(Suggestions::parse("} backwards {"), None);
    }

    #[test]
    fn applies_each_valid_suggestion() {
        let adapter = TreeSitterAdapter::new(Language::Python);
        let code = "def f(x):\n    y = x + 1\n    return y\n";
        let suggestions = Suggestions {
            naming_map: BTreeMap::from([
                ("y".to_string(), "total".to_string()),
                ("missing".to_string(), "other".to_string()),
                ("x".to_string(), "not valid".to_string()),
            ]),
            docstrings: BTreeMap::from([("f".to_string(), "Add one to x.".to_string())]),
            ..Suggestions::default()
        };

        let enrichment = apply_suggestions(&adapter, code, &suggestions);
        assert!(enrichment.code.contains("total = x + 1"));
        assert!(enrichment.code.contains("return total"));
        assert!(enrichment.code.contains("\"\"\"Add one to x.\"\"\""));
        assert_eq!(enrichment.changes.len(), 2);
        assert_eq!(enrichment.skipped.len(), 2);
        assert!(adapter.validate_syntax(&enrichment.code).is_ok());
    }
}
