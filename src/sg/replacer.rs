use crate::edit::{EditVerification, SpanEdit};
use crate::sg::errors::AstGrepError;
use crate::sg::matcher::PatternMatch;

/// A replacement operation with source and target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub byte_start: usize,
    pub byte_end: usize,
    /// Original text (for verification)
    pub original: String,
    pub replacement: String,
}

impl Replacement {
    pub fn to_edit(&self) -> SpanEdit {
        SpanEdit {
            byte_start: self.byte_start,
            byte_end: self.byte_end,
            new_text: self.replacement.clone(),
            expected_before: EditVerification::from_text(&self.original),
        }
    }

    fn overlaps(&self, other: &Replacement) -> bool {
        self.byte_start < other.byte_end && other.byte_start < self.byte_end
    }
}

/// Replace a whole match using a template that references captures.
///
/// Template syntax: `$NAME` references a captured metavariable.
pub fn replace_with_template(
    pattern_match: &PatternMatch,
    template: &str,
) -> Result<Replacement, AstGrepError> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(after.len());
        if name_len == 0 {
            result.push('$');
            rest = after;
            continue;
        }
        let name = &after[..name_len];
        result.push_str(pattern_match.capture(name)?);
        rest = &after[name_len..];
    }
    result.push_str(rest);

    Ok(Replacement {
        byte_start: pattern_match.byte_start,
        byte_end: pattern_match.byte_end,
        original: pattern_match.text.clone(),
        replacement: result,
    })
}

/// Keep the earliest, outermost replacement of every overlapping group.
pub fn drop_overlapping(mut replacements: Vec<Replacement>) -> Vec<Replacement> {
    replacements.sort_by(|a, b| {
        a.byte_start
            .cmp(&b.byte_start)
            .then(b.byte_end.cmp(&a.byte_end))
    });

    let mut kept: Vec<Replacement> = Vec::with_capacity(replacements.len());
    for candidate in replacements {
        if kept.last().is_some_and(|last| last.overlaps(&candidate)) {
            continue;
        }
        kept.push(candidate);
    }
    kept
}
