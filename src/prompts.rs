//! Prompt construction for transformation, syntax correction and analysis.

use crate::lang::Language;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefactorType {
    #[default]
    Comprehensive,
    Performance,
    Readability,
    Security,
}

impl RefactorType {
    pub fn as_str(self) -> &'static str {
        match self {
            RefactorType::Comprehensive => "comprehensive",
            RefactorType::Performance => "performance",
            RefactorType::Readability => "readability",
            RefactorType::Security => "security",
        }
    }

    fn focus(self) -> &'static str {
        match self {
            RefactorType::Performance => {
                "Focus primarily on PERFORMANCE optimizations: optimize loops, reduce complexity, improve algorithms, eliminate redundant operations."
            }
            RefactorType::Readability => {
                "Focus primarily on READABILITY improvements: better naming, clearer logic flow, simplified expressions, consistent formatting."
            }
            RefactorType::Security => {
                "Focus primarily on SECURITY improvements: fix vulnerabilities, secure data handling, input validation, safe coding practices."
            }
            RefactorType::Comprehensive => {
                "Provide COMPREHENSIVE refactoring: improve naming, simplify logic, remove duplication, add typing where the language supports it, and make the code modern and clean."
            }
        }
    }
}

impl fmt::Display for RefactorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefactorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comprehensive" => Ok(RefactorType::Comprehensive),
            "performance" => Ok(RefactorType::Performance),
            "readability" => Ok(RefactorType::Readability),
            "security" => Ok(RefactorType::Security),
            other => Err(format!("unknown refactor type '{other}'")),
        }
    }
}

/// Knobs that shape the transformation prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub refactor_type: RefactorType,
    pub preserve_comments: bool,
    pub add_documentation: bool,
    pub follow_conventions: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            refactor_type: RefactorType::Comprehensive,
            preserve_comments: true,
            add_documentation: true,
            follow_conventions: false,
        }
    }
}

/// A system and user turn ready to hand to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Main rewrite request.
    pub fn transformation(language: Language, code: &str, options: &ProcessingOptions) -> Self {
        let name = language.display_name();
        let comments = if options.preserve_comments {
            "PRESERVE all existing comments and keep them where they are."
        } else {
            "Remove unnecessary comments but keep essential ones."
        };
        let docs = if options.add_documentation {
            "ADD clear documentation for functions and classes where it is missing."
        } else {
            "Do not add new documentation unless absolutely necessary."
        };
        let conventions = if options.follow_conventions {
            format!("STRICTLY follow {name} coding conventions and style guidelines.")
        } else {
            "Keep the existing code style while making improvements.".to_string()
        };

        let system = format!(
            "You are an expert code refactoring engine.\n\n\
             Take the {name} code you are given and return only the refactored version. \
             Follow these rules strictly:\n\n\
             1. Do not explain anything. Do not wrap the code in markdown.\n\
             2. Keep the original structure and language.\n\
             3. {focus}\n\
             4. {comments}\n\
             5. {docs}\n\
             6. {conventions}\n\
             7. NEVER output text like 'Here is the refactored code:'. Output only the code.\n\n\
             Your output must be clean, minimal, and production-ready.",
            focus = options.refactor_type.focus(),
        );
        Self {
            system,
            user: fenced_input(language, code),
        }
    }

    /// Ask for the smallest edit that fixes `error` in `broken`.
    pub fn correction(language: Language, broken: &str, error: &str, original: &str) -> Self {
        let name = language.display_name();
        let tag = language.fence_tag();
        let system = format!(
            "You are a syntax error correction specialist for {name} code.\n\n\
             Your ONLY job is to fix syntax errors in the provided code while preserving all \
             functionality and logic.\n\n\
             Rules:\n\
             1. Fix ONLY syntax errors. Do not refactor or improve the code.\n\
             2. Preserve all variable names, function names, and logic exactly as they are.\n\
             3. Output ONLY the corrected code, with no explanations and no markdown.\n\
             4. Do not add or remove functionality.\n\
             5. Make sure the output is valid {name} syntax.\n\n\
             You will receive the broken code and the exact error message. Fix only what is broken."
        );
        let user = format!(
            "BROKEN CODE:\n```{tag}\n{broken}\n```\n\n\
             ERROR MESSAGE:\n{error}\n\n\
             ORIGINAL CODE (for reference):\n```{tag}\n{original}\n```\n\n\
             Fix the syntax error in the broken code. Output only the corrected code."
        );
        Self { system, user }
    }

    /// Ask for naming and documentation suggestions as JSON.
    pub fn analysis(language: Language, code: &str) -> Self {
        let name = language.display_name();
        let mut system = format!(
            "You are a {name} code analysis expert. Analyze the provided code and return \
             improvement suggestions.\n\n\
             Return ONLY a valid JSON object with this structure:\n\
             {{\n  \
               \"suggestions\": [\"short improvement suggestion\"],\n  \
               \"naming_map\": {{\"old_identifier\": \"new_identifier\"}},\n  \
               \"docstrings\": {{\"function_or_class_name\": \"one sentence description\"}},\n  \
               \"performance_hints\": [\"short hint\"]\n\
             }}\n\n\
             Only propose renames for identifiers that appear in the code. \
             Do NOT include code in your response."
        );
        if let Some(focus) = language_focus(language) {
            system.push_str("\n\n");
            system.push_str(focus);
        }
        Self {
            system,
            user: fenced_input(language, code),
        }
    }
}

fn fenced_input(language: Language, code: &str) -> String {
    format!(
        "Language: {}\n\n```{}\n{}\n```",
        language.display_name(),
        language.fence_tag(),
        code
    )
}

fn language_focus(language: Language) -> Option<&'static str> {
    match language {
        Language::Python => Some("Python focus: PEP 8 naming, comprehensions, context managers, type hints."),
        Language::JavaScript | Language::TypeScript => {
            Some("JavaScript focus: modern syntax, async/await, destructuring, descriptive names.")
        }
        Language::Java => Some("Java focus: OOP principles, generics, streams, exception handling."),
        Language::Cpp => Some("C++ focus: RAII, smart pointers, const correctness."),
        Language::C | Language::Rust => None,
    }
}
