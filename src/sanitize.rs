//! Recover code from raw model output.
//!
//! Models wrap code in markdown fences, chat preambles and leaked prompt
//! markers. [`extract_code`] prefers a fenced block that looks like code,
//! then falls back to keeping the code-shaped lines (with the blank and
//! comment lines between them), and finally returns the text with fence
//! markers and chatter removed.

use crate::lang::{CodeShape, Language};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

const TRACE_TARGET: &str = "refactor_guard::sanitize";

/// Paired prompt-template markers that some local models echo back.
static INSTRUCTION_BLOCKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[INST\].*?\[/INST\]|<<INST>>.*?<</INST>>|<<SYS>>.*?<</SYS>>|\[SYS\].*?\[/SYS\]")
        .expect("instruction block regex is valid")
});

/// Unpaired markers left over after the blocks are gone.
static INSTRUCTION_TOKENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[/?INST\]|<</?INST>>|<</?SYS>>|\[/?SYS\]").expect("instruction token regex is valid")
});

/// Chat preambles and sign-offs.
static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(here is|here's|here are|below is|this is the|the refactored|the corrected|the fixed|refactored code|corrected code|fixed code|sure[,!. ]|certainly[,!. ]|of course[,!. ]|i have |i've |note:|explanation:|changes made|output:)",
    )
    .expect("boilerplate regex is valid")
});

#[derive(Debug)]
struct Fence {
    tag: String,
    body: String,
}

/// Pull code out of `raw`, using `shape` to recognise code lines.
pub fn extract_code(raw: &str, shape: &CodeShape, language: Language) -> String {
    let cleaned = INSTRUCTION_BLOCKS.replace_all(raw, "");
    let cleaned = INSTRUCTION_TOKENS.replace_all(&cleaned, "");

    let fences = fences(&cleaned);
    let chosen = fences
        .iter()
        .find(|fence| shape.looks_like_code(&fence.body))
        .or_else(|| {
            fences
                .iter()
                .find(|fence| language.fence_tags().contains(&fence.tag.as_str()))
        });
    if let Some(fence) = chosen {
        debug!(target: TRACE_TARGET, tag = %fence.tag, fences = fences.len(), "using fenced block");
        return fence.body.trim().to_string();
    }

    if let Some(code) = filter_lines(&cleaned, shape) {
        debug!(target: TRACE_TARGET, "using line filter");
        return code;
    }

    // Nothing code-shaped: keep the text minus fence markers and chatter,
    // so a reply made only of an empty fence comes back empty.
    cleaned
        .lines()
        .filter(|line| !is_boilerplate(line, shape))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Fenced blocks in order. An unterminated fence runs to the end of the text.
fn fences(text: &str) -> Vec<Fence> {
    let mut found = Vec::new();
    let mut open: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        match line.trim_start().strip_prefix("```") {
            Some(info) => match open.take() {
                Some((tag, lines)) => found.push(Fence {
                    tag,
                    body: lines.join("\n"),
                }),
                None => {
                    let tag = info
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_lowercase();
                    open = Some((tag, Vec::new()));
                }
            },
            None => {
                if let Some((_, lines)) = open.as_mut() {
                    lines.push(line);
                }
            }
        }
    }
    if let Some((tag, lines)) = open {
        found.push(Fence {
            tag,
            body: lines.join("\n"),
        });
    }

    found.retain(|fence| !fence.body.trim().is_empty());
    found
}

fn filter_lines(text: &str, shape: &CodeShape) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !is_boilerplate(line, shape))
        .collect();
    let first = lines.iter().position(|line| shape.is_code_line(line))?;
    let last = lines.iter().rposition(|line| shape.is_code_line(line))?;
    // Between the outer code lines, keep structure (blank lines, comments)
    // but drop prose the model interleaved with the code.
    let kept: Vec<&str> = lines[first..=last]
        .iter()
        .copied()
        .filter(|line| {
            line.trim().is_empty() || shape.is_code_line(line) || shape.is_comment_line(line)
        })
        .collect();
    Some(kept.join("\n"))
}

fn is_boilerplate(line: &str, shape: &CodeShape) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with("```") || trimmed.starts_with("-->") {
        return true;
    }
    // Stray quote lines, but not docstrings or string statements
    if trimmed.starts_with('"') && !trimmed.starts_with("\"\"\"") && !shape.is_code_line(line) {
        return true;
    }
    // `output: int = 0` is an annotated assignment, not a preamble
    if shape.is_code_line(line) && (trimmed.contains('=') || trimmed.contains('(')) {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    if lowered.contains("no refactoring performed") || lowered.contains("already as simple") {
        return true;
    }
    BOILERPLATE.is_match(trimmed)
}
