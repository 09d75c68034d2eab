//! Thread-local parser pooling.
//!
//! Grammar setup is the expensive part of parsing, and every candidate in a
//! transformation (original, model output, each repair attempt) is parsed at
//! least once. Each thread keeps one parser per language and reuses it.

use crate::lang::{Language, LanguageError, SourceParser};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static PARSERS: RefCell<HashMap<Language, SourceParser>> = RefCell::new(HashMap::new());
}

/// Execute function with a pooled parser for `language`.
///
/// On first call per thread and language, creates a new parser. Subsequent
/// calls reuse the same instance.
///
/// # Example
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use refactor_guard::lang::Language;
/// use refactor_guard::pool::with_parser;
///
/// let has_errors = with_parser(Language::Python, |parser| {
///     parser.parse_with_source("def f():\n    pass\n").map(|p| p.has_errors())
/// })??;
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(language: Language, f: F) -> Result<R, LanguageError>
where
    F: FnOnce(&mut SourceParser) -> R,
{
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(language) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(SourceParser::new(language)?)
            }
        };
        Ok(f(parser))
    })
}

/// Number of languages with a live parser on this thread.
pub fn pooled_languages() -> usize {
    PARSERS.with(|cell| cell.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsers_are_reused_per_language() {
        let before = pooled_languages();
        with_parser(Language::Rust, |p| p.language()).unwrap();
        with_parser(Language::Rust, |p| p.language()).unwrap();
        let after_rust = pooled_languages();
        assert!(after_rust <= before + 1);

        let lang = with_parser(Language::Python, |p| p.language()).unwrap();
        assert_eq!(lang, Language::Python);
        assert!(pooled_languages() >= after_rust);
    }
}
