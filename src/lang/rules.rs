//! Deterministic, semantics-preserving rewrites.
//!
//! Only boolean-literal comparisons are rewritten: `x == true` becomes `x`
//! and `x == false` becomes the language's negation of `x`. The rules are
//! restricted to languages where the comparison operand is statically a
//! boolean in idiomatic code and no truthiness coercion hides behind `==`
//! (so no `==` rules for JavaScript, only `===`; none at all for C/C++).

use crate::edit::apply_edits;
use crate::lang::language::Language;
use crate::lang::validator::validate_syntax;
use crate::sg::{drop_overlapping, replace_with_template, PatternMatcher, Replacement};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const TRACE_TARGET: &str = "refactor_guard::rules";

/// Operand shapes that can be negated without parentheses.
static SIMPLE_OPERAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*(\(\))?$")
        .expect("operand regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rewrite {
    /// Replace the comparison with its operand.
    Operand,
    /// Replace the comparison with the negated operand.
    Negate,
}

#[derive(Debug, Clone, Copy)]
struct SafeRule {
    name: &'static str,
    pattern: &'static str,
    rewrite: Rewrite,
}

const fn rule(name: &'static str, pattern: &'static str, rewrite: Rewrite) -> SafeRule {
    SafeRule {
        name,
        pattern,
        rewrite,
    }
}

const PYTHON_RULES: &[SafeRule] = &[
    rule("simplify `== True`", "$X == True", Rewrite::Operand),
    rule("simplify `== False`", "$X == False", Rewrite::Negate),
    rule("simplify `!= False`", "$X != False", Rewrite::Operand),
    rule("simplify `!= True`", "$X != True", Rewrite::Negate),
];

const STRICT_JS_RULES: &[SafeRule] = &[
    rule("simplify `=== true`", "$X === true", Rewrite::Operand),
    rule("simplify `=== false`", "$X === false", Rewrite::Negate),
    rule("simplify `!== false`", "$X !== false", Rewrite::Operand),
    rule("simplify `!== true`", "$X !== true", Rewrite::Negate),
];

const TYPED_RULES: &[SafeRule] = &[
    rule("simplify `== true`", "$X == true", Rewrite::Operand),
    rule("simplify `== false`", "$X == false", Rewrite::Negate),
    rule("simplify `!= false`", "$X != false", Rewrite::Operand),
    rule("simplify `!= true`", "$X != true", Rewrite::Negate),
];

fn rules_for(language: Language) -> &'static [SafeRule] {
    match language {
        Language::Python => PYTHON_RULES,
        Language::JavaScript | Language::TypeScript => STRICT_JS_RULES,
        Language::Java | Language::Rust => TYPED_RULES,
        Language::C | Language::Cpp => &[],
    }
}

/// Output of the safe rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransform {
    pub code: String,
    /// One entry per applied rule, with its match count.
    pub applied: Vec<String>,
}

impl SafeTransform {
    fn unchanged(code: &str) -> Self {
        Self {
            code: code.to_string(),
            applied: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Apply all safe rules for `language`.
///
/// Input that does not validate is returned unchanged, and so is any
/// rewrite whose result fails validation.
pub fn apply_safe_rules(language: Language, source: &str) -> SafeTransform {
    let rules = rules_for(language);
    if rules.is_empty() || validate_syntax(language, source).is_err() {
        return SafeTransform::unchanged(source);
    }

    let matcher = PatternMatcher::new(source, language);
    let mut replacements: Vec<(Replacement, &'static str)> = Vec::new();
    for rule in rules {
        let Ok(matches) = matcher.find_all(rule.pattern) else {
            continue;
        };
        for m in matches {
            let replacement = match rule.rewrite {
                Rewrite::Operand => replace_with_template(&m, "$X"),
                Rewrite::Negate => m.capture("X").map(|operand| Replacement {
                    byte_start: m.byte_start,
                    byte_end: m.byte_end,
                    original: m.text.clone(),
                    replacement: negate(language, operand),
                }),
            };
            if let Ok(replacement) = replacement {
                replacements.push((replacement, rule.name));
            }
        }
    }

    let kept = drop_overlapping(replacements.iter().map(|(r, _)| r.clone()).collect());
    if kept.is_empty() {
        return SafeTransform::unchanged(source);
    }

    let mut applied: Vec<(&'static str, usize)> = Vec::new();
    for kept_replacement in &kept {
        let name = replacements
            .iter()
            .find(|(r, _)| r == kept_replacement)
            .map(|(_, name)| *name)
            .unwrap_or("rewrite");
        match applied.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => applied.push((name, 1)),
        }
    }

    let edits = kept.iter().map(Replacement::to_edit).collect();
    let rewritten = match apply_edits(source, edits) {
        Ok(code) => code,
        Err(e) => {
            debug!(target: TRACE_TARGET, error = %e, "safe rewrite edits rejected");
            return SafeTransform::unchanged(source);
        }
    };

    if let Err(e) = validate_syntax(language, &rewritten) {
        debug!(target: TRACE_TARGET, error = %e, "safe rewrite produced invalid code, discarded");
        return SafeTransform::unchanged(source);
    }

    SafeTransform {
        code: rewritten,
        applied: applied
            .into_iter()
            .map(|(name, count)| format!("{name} ({count}x)"))
            .collect(),
    }
}

fn negate(language: Language, operand: &str) -> String {
    let operand = operand.trim();
    let wrapped = if SIMPLE_OPERAND.is_match(operand) || is_parenthesized(operand) {
        operand.to_string()
    } else {
        format!("({operand})")
    };
    match language {
        Language::Python => format!("not {wrapped}"),
        _ => format!("!{wrapped}"),
    }
}

/// True when the first `(` closes at the very end of `text`.
fn is_parenthesized(text: &str) -> bool {
    if !text.starts_with('(') || !text.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == text.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_comparisons_simplified() {
        let source = "if ready == True:\n    go()\nif done == False:\n    wait()\n";
        let out = apply_safe_rules(Language::Python, source);
        assert_eq!(out.code, "if ready:\n    go()\nif not done:\n    wait()\n");
        assert_eq!(out.applied.len(), 2);
    }

    #[test]
    fn complex_operands_are_parenthesized() {
        let source = "fn f(a: bool, b: bool) -> bool { a && b.not() == false }";
        let out = apply_safe_rules(Language::Rust, source);
        assert_eq!(out.code, "fn f(a: bool, b: bool) -> bool { a && !b.not() }");

        let grouped = "fn g(a: bool, b: bool) -> bool { (a || b) == false }";
        let out = apply_safe_rules(Language::Rust, grouped);
        assert_eq!(out.code, "fn g(a: bool, b: bool) -> bool { !(a || b) }");

        assert_eq!(negate(Language::Python, "x + 1"), "not (x + 1)");
        assert_eq!(negate(Language::Java, "(a) || (b)"), "!((a) || (b))");
    }

    #[test]
    fn javascript_loose_equality_untouched() {
        let source = "if (x == true) { run(); }\nif (y === true) { run(); }\n";
        let out = apply_safe_rules(Language::JavaScript, source);
        assert!(out.code.contains("x == true"));
        assert!(out.code.contains("if (y)"));
    }

    #[test]
    fn c_has_no_rules() {
        let source = "int f(int x) { return x == 1; }";
        let out = apply_safe_rules(Language::C, source);
        assert_eq!(out.code, source);
        assert!(!out.changed());
    }

    #[test]
    fn invalid_input_is_returned_unchanged() {
        let source = "def f(:\n    return x == True\n";
        let out = apply_safe_rules(Language::Python, source);
        assert_eq!(out.code, source);
        assert!(out.applied.is_empty());
    }

    #[test]
    fn java_method_call_operand() {
        let source = "class A { void f() { if (list.isEmpty() == false) { g(); } } }";
        let out = apply_safe_rules(Language::Java, source);
        assert!(out.code.contains("if (!list.isEmpty())"), "got: {}", out.code);
    }
}
