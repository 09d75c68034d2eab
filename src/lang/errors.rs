use crate::edit::EditError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LanguageError {
    #[error("failed to set {language} grammar for parser")]
    LanguageSet { language: &'static str },

    #[error("failed to parse {language} source code")]
    ParseFailed { language: &'static str },
}

/// Failures of the structural enrichment edits (rename, documentation insert).
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("'{name}' is not a valid identifier")]
    InvalidName { name: String },

    #[error("identifier '{name}' not found")]
    NotFound { name: String },

    #[error("renaming to '{name}' would collide with an existing identifier")]
    Collision { name: String },

    #[error("'{symbol}' already has documentation")]
    AlreadyDocumented { symbol: String },

    #[error("cannot document '{symbol}': {reason}")]
    Unsupported { symbol: String, reason: String },

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error(transparent)]
    Edit(#[from] EditError),
}
