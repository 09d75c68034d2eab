use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// One unit of work for the orchestrator. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationRequest {
    code: String,
    language: String,
    file_path: String,
    session_id: Option<String>,
    model: Option<String>,
}

impl TransformationRequest {
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            file_path: String::new(),
            session_id: None,
            model: None,
        }
    }

    /// Build a request for a file whose language is known from its extension.
    pub fn for_file(path: &Path, code: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(code, language).with_file_path(path.display().to_string())
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Opaque label for logs; may be empty.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// xxh3 of the code, as 16 hex digits.
    pub fn fingerprint(&self) -> String {
        format!("{:016x}", xxh3_64(self.code.as_bytes()))
    }
}
