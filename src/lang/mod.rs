//! Language adapters: parsing, syntax validation, symbol extraction and
//! deterministic rewrites for each supported language.
//!
//! All grammars come from ast-grep-language, so tree-sitter parsing and
//! ast-grep pattern matching agree on node kinds.

pub mod adapter;
pub mod enrich;
pub mod errors;
pub mod language;
pub mod parser;
pub mod registry;
pub mod rules;
pub mod shape;
pub mod symbols;
pub mod validator;

pub use adapter::{LanguageAdapter, TreeSitterAdapter};
pub use errors::{EnrichError, LanguageError};
pub use language::Language;
pub use parser::{ErrorNode, ParsedSource, SourceParser};
pub use registry::AdapterRegistry;
pub use rules::{apply_safe_rules, SafeTransform};
pub use shape::CodeShape;
pub use symbols::{extract_symbols, Symbol, SymbolKind};
pub use validator::{is_trivial, validate_syntax, ErrorLocation, SyntaxError};
