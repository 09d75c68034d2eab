use crate::backend::BackendKind;
use crate::error::{ErrorKind, TransformError};
use serde::Serialize;

/// Outcome of one transformation.
///
/// When `success` is false, `final_code` is always the request's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformationResult {
    pub success: bool,
    pub final_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TransformError>,
    /// Validity of the code as received.
    pub original_valid: bool,
    pub final_valid: bool,
    pub warnings: Vec<String>,
    /// Structural edits applied, one line each.
    pub changes: Vec<String>,
    /// Backend whose output became `final_code`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

impl TransformationResult {
    pub fn succeeded(
        final_code: String,
        original_valid: bool,
        warnings: Vec<String>,
        changes: Vec<String>,
        backend: Option<BackendKind>,
    ) -> Self {
        Self {
            success: true,
            final_code,
            error: None,
            original_valid,
            final_valid: true,
            warnings,
            changes,
            backend,
        }
    }

    /// A failed result carrying the untouched input.
    pub fn failed(
        original_code: &str,
        error: TransformError,
        original_valid: bool,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            final_code: original_code.to_string(),
            error: Some(error),
            original_valid,
            final_valid: original_valid,
            warnings,
            changes: Vec::new(),
            backend: None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|error| error.kind)
    }

    /// Did the transformation change anything?
    pub fn changed(&self, original_code: &str) -> bool {
        self.success && self.final_code != original_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_keeps_input() {
        let result = TransformationResult::failed(
            "x = 1",
            TransformError::new(ErrorKind::Transport, "timeout"),
            true,
            vec!["w".to_string()],
        );
        assert!(!result.success);
        assert_eq!(result.final_code, "x = 1");
        assert!(result.final_valid);
        assert_eq!(result.error_kind(), Some(ErrorKind::Transport));
        assert!(!result.changed("x = 1"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["kind"], "transport");
        assert!(json["error"].get("detail").is_none());
        assert!(json.get("backend").is_none());
    }
}
