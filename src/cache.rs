//! Thread-local pattern compilation cache for ast-grep patterns.
//!
//! The safe rewrite rules run the same handful of patterns against every
//! request, so compiled patterns are cached per thread.
//! Cache is capped at 256 entries; when full it is cleared and rebuilt.

use crate::lang::Language;
use ast_grep_core::Pattern;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 256;

thread_local! {
    // Same pattern text compiles differently per grammar, so the language is part of the key
    static PATTERN_CACHE: RefCell<HashMap<(Language, String), Pattern>> =
        RefCell::new(HashMap::new());
}

/// Get a compiled pattern from cache, or compile and cache it.
pub fn get_or_compile_pattern(pattern_str: &str, language: Language) -> Pattern {
    let cache_key = (language, pattern_str.to_string());

    PATTERN_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(p) = cache.get(&cache_key) {
            return p.clone();
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Pattern::new(pattern_str, language.support_lang());
        cache.insert(cache_key, compiled.clone());
        compiled
    })
}

/// Clear the pattern cache (mainly for testing).
pub fn clear_cache() {
    PATTERN_CACHE.with(|cache| {
        cache.borrow_mut().clear();
    });
}

pub fn cache_size() -> usize {
    PATTERN_CACHE.with(|cache| cache.borrow().len())
}
