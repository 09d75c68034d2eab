use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Safe rewrite rules, identifier renames and documentation inserts all
/// compile down to span edits over an in-memory buffer. A candidate is only
/// ever produced by [`apply_edits`], which refuses stale or overlapping spans.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpanEdit does nothing until passed to apply_edits()"]
pub struct SpanEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at bytes {byte_start}..{byte_end}: found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in source of length {source_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        source_len: usize,
    },

    #[error("edits overlap at bytes {byte_start}..{byte_end}")]
    Overlap { byte_start: usize, byte_end: usize },

    #[error("byte offset {offset} is not on a UTF-8 character boundary")]
    NotCharBoundary { offset: usize },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpanEdit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Pure insertion at `offset`.
    pub fn insert(offset: usize, new_text: impl Into<String>) -> Self {
        Self::new(offset, offset, new_text, "")
    }

    /// Check the edit against `source`.
    fn validate(&self, source: &str) -> Result<(), EditError> {
        if self.byte_start > self.byte_end || self.byte_end > source.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                source_len: source.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !source.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }

        let current = &source[self.byte_start..self.byte_end];
        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }
        Ok(())
    }
}

/// Apply a batch of edits to `source`, returning the new text.
///
/// All edits are verified against the original before any is applied.
/// Edits are applied bottom-to-top so offsets stay valid. Two insertions at
/// the same offset are rejected as overlapping.
pub fn apply_edits(source: &str, mut edits: Vec<SpanEdit>) -> Result<String, EditError> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    for edit in &edits {
        edit.validate(source)?;
    }

    // Descending by start; for equal starts the longer span first
    edits.sort_by(|a, b| {
        b.byte_start
            .cmp(&a.byte_start)
            .then(b.byte_end.cmp(&a.byte_end))
    });

    for window in edits.windows(2) {
        let (later, earlier) = (&window[0], &window[1]);
        if earlier.byte_end > later.byte_start || earlier.byte_start == later.byte_start {
            return Err(EditError::Overlap {
                byte_start: later.byte_start,
                byte_end: earlier.byte_end.max(later.byte_end),
            });
        }
    }

    let mut output = source.to_string();
    for edit in &edits {
        output.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
    }
    Ok(output)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file is left untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Tempfile in the same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("hello world".to_string());
        assert!(verify.matches("hello world"));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
    }

    #[test]
    fn test_edit_validation_invalid_range() {
        let edits = vec![SpanEdit::new(5, 20, "replacement", "")];
        let result = apply_edits("hello world", edits);
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_inverted_range() {
        let edits = vec![SpanEdit::new(10, 5, "replacement", "")];
        let result = apply_edits("hello world", edits);
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_before_text_mismatch() {
        let edits = vec![SpanEdit::new(0, 5, "HELLO", "howdy")];
        let result = apply_edits("hello world", edits);
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_batch_edits_any_order() {
        let source = "line1\nline2\nline3\n";
        let edits = vec![
            SpanEdit::new(6, 11, "LINE2", "line2"),
            SpanEdit::new(0, 5, "LINE1", "line1"),
            SpanEdit::new(12, 17, "LINE3 is longer", "line3"),
        ];
        let out = apply_edits(source, edits).unwrap();
        assert_eq!(out, "LINE1\nLINE2\nLINE3 is longer\n");
    }

    #[test]
    fn test_overlapping_edits_rejected() {
        let source = "abcdefgh";
        let edits = vec![SpanEdit::new(0, 4, "x", "abcd"), SpanEdit::new(2, 6, "y", "cdef")];
        assert!(matches!(
            apply_edits(source, edits),
            Err(EditError::Overlap { .. })
        ));

        let inserts = vec![SpanEdit::insert(3, "a"), SpanEdit::insert(3, "b")];
        assert!(matches!(
            apply_edits(source, inserts),
            Err(EditError::Overlap { .. })
        ));
    }

    #[test]
    fn test_char_boundary_enforced() {
        let source = "héllo";
        let edits = vec![SpanEdit::new(1, 2, "e", "\u{e9}")];
        assert!(matches!(
            apply_edits(source, edits),
            Err(EditError::NotCharBoundary { .. })
        ));
    }

    #[test]
    fn test_atomic_write_integration() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.py");
        fs::write(&file_path, b"original content").unwrap();

        atomic_write(&file_path, b"modified content").unwrap();

        let new_content = fs::read_to_string(&file_path).unwrap();
        assert_eq!(new_content, "modified content");
    }
}
