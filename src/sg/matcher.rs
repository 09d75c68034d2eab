use crate::cache;
use crate::lang::Language;
use crate::sg::errors::AstGrepError;
use ast_grep_core::tree_sitter::StrDoc;
use ast_grep_core::{AstGrep, NodeMatch};
use ast_grep_language::SupportLang;
use std::collections::HashMap;

/// A match from an ast-grep pattern with captured metavariables.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    /// Byte range of the entire match
    pub byte_start: usize,
    pub byte_end: usize,
    pub text: String,
    /// Captured metavariables: name -> text
    pub captures: HashMap<String, String>,
}

impl PatternMatch {
    pub fn capture(&self, name: &str) -> Result<&str, AstGrepError> {
        self.captures
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AstGrepError::MetavarNotFound {
                name: name.to_string(),
            })
    }
}

/// Pattern matcher using ast-grep's metavariable syntax.
///
/// - `$NAME` matches a single node and captures it
/// - `$$$NAME` matches zero or more nodes
///
/// Languages whose grammar rejects `$` in identifiers (Python, C) get the
/// metavariable rewritten by ast-grep-language before compilation.
pub struct PatternMatcher {
    source: String,
    language: Language,
    sg: AstGrep<StrDoc<SupportLang>>,
}

impl PatternMatcher {
    pub fn new(source: &str, language: Language) -> Self {
        let sg = AstGrep::new(source, language.support_lang());
        Self {
            source: source.to_string(),
            language,
            sg,
        }
    }

    /// Find all matches for a pattern, outermost first in document order.
    pub fn find_all(&self, pattern: &str) -> Result<Vec<PatternMatch>, AstGrepError> {
        if pattern.trim().is_empty() {
            return Err(AstGrepError::InvalidPattern {
                message: "empty pattern".to_string(),
            });
        }
        let pat = cache::get_or_compile_pattern(pattern, self.language);
        let root = self.sg.root();
        Ok(root
            .find_all(&pat)
            .map(|m| self.node_match_to_pattern_match(m))
            .collect())
    }

    pub fn has_match(&self, pattern: &str) -> bool {
        let pat = cache::get_or_compile_pattern(pattern, self.language);
        self.sg.root().find(&pat).is_some()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn node_match_to_pattern_match(&self, m: NodeMatch<StrDoc<SupportLang>>) -> PatternMatch {
        let range = m.get_node().range();
        let text = self
            .source
            .get(range.start..range.end)
            .unwrap_or_default()
            .to_string();

        let env = m.get_env().clone();
        let captures: HashMap<String, String> = env.into();

        PatternMatch {
            byte_start: range.start,
            byte_end: range.end,
            text,
            captures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_rust_comparisons() {
        let source = r#"
fn test(a: bool, b: bool) {
    if a == true { }
    if b == false { }
}
"#;
        let matcher = PatternMatcher::new(source, Language::Rust);
        let matches = matcher.find_all("$X == true").unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].capture("X").unwrap(), "a");
        assert_eq!(&source[matches[0].byte_start..matches[0].byte_end], "a == true");
    }

    #[test]
    fn python_metavariables_work() {
        let source = "if ready == True:\n    go()\n";
        let matcher = PatternMatcher::new(source, Language::Python);
        let matches = matcher.find_all("$X == True").unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].capture("X").unwrap(), "ready");
    }

    #[test]
    fn missing_capture_is_an_error() {
        let matcher = PatternMatcher::new("let a = b.clone();", Language::Rust);
        let m = &matcher.find_all("$E.clone()").unwrap()[0];
        assert!(matches!(
            m.capture("OTHER"),
            Err(AstGrepError::MetavarNotFound { .. })
        ));
    }

    #[test]
    fn empty_pattern_rejected() {
        let matcher = PatternMatcher::new("x", Language::JavaScript);
        assert!(matches!(
            matcher.find_all("  "),
            Err(AstGrepError::InvalidPattern { .. })
        ));
        assert!(!matcher.has_match("$X === true"));
    }
}
