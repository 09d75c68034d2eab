use crate::lang::enrich;
use crate::lang::errors::EnrichError;
use crate::lang::language::Language;
use crate::lang::rules::{apply_safe_rules, SafeTransform};
use crate::lang::shape::CodeShape;
use crate::lang::symbols::{extract_symbols, Symbol};
use crate::lang::validator::{validate_syntax, SyntaxError};

/// Everything the pipeline needs to know about one language.
///
/// Implementations must be deterministic and side-effect free: the
/// orchestrator calls them freely on candidates it may discard.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// `Ok(())` when `code` parses without errors. Trivial input is valid.
    fn validate_syntax(&self, code: &str) -> Result<(), SyntaxError>;

    fn extract_symbols(&self, code: &str) -> Vec<Symbol>;

    /// Deterministic rewrites that never change behavior.
    fn apply_safe_transform(&self, code: &str) -> SafeTransform;

    /// Line heuristics used when cleaning model output.
    fn code_shape(&self) -> &'static CodeShape;

    fn rename_identifier(&self, code: &str, old: &str, new: &str) -> Result<String, EnrichError> {
        enrich::rename_identifier(self.language(), code, old, new)
    }

    fn insert_doc(&self, code: &str, symbol: &str, doc: &str) -> Result<String, EnrichError> {
        enrich::insert_doc(self.language(), code, symbol, doc)
    }
}

/// Adapter backed by the tree-sitter grammar for its language.
#[derive(Debug, Clone, Copy)]
pub struct TreeSitterAdapter {
    language: Language,
}

impl TreeSitterAdapter {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl LanguageAdapter for TreeSitterAdapter {
    fn language(&self) -> Language {
        self.language
    }

    fn validate_syntax(&self, code: &str) -> Result<(), SyntaxError> {
        validate_syntax(self.language, code)
    }

    fn extract_symbols(&self, code: &str) -> Vec<Symbol> {
        extract_symbols(self.language, code)
    }

    fn apply_safe_transform(&self, code: &str) -> SafeTransform {
        apply_safe_rules(self.language, code)
    }

    fn code_shape(&self) -> &'static CodeShape {
        CodeShape::for_language(self.language)
    }
}
