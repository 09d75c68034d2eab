//! Structural enrichment edits: identifier renames and documentation inserts.
//!
//! Both operate on the parse tree, never on raw text, so occurrences inside
//! strings and comments are left alone. Callers validate the result.

use crate::edit::{apply_edits, SpanEdit};
use crate::lang::errors::EnrichError;
use crate::lang::language::Language;
use crate::lang::symbols::find_definition;
use crate::pool;
use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid"));

/// Node kinds that hold a plain identifier in each grammar.
fn is_identifier_kind(language: Language, kind: &str) -> bool {
    match language {
        Language::Python | Language::Java | Language::C => kind == "identifier",
        Language::JavaScript | Language::TypeScript => {
            matches!(kind, "identifier" | "shorthand_property_identifier")
        }
        Language::Cpp | Language::Rust => kind == "identifier",
    }
}

/// Identifiers that name a member of some other object rather than a binding.
fn is_member_position(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let field = match parent.kind() {
        "attribute" => "attribute",
        "keyword_argument" => "name",
        "field_access" => "field",
        _ => return false,
    };
    parent.child_by_field_name(field) == Some(node)
}

/// Rename every binding occurrence of `old` to `new`.
pub fn rename_identifier(
    language: Language,
    source: &str,
    old: &str,
    new: &str,
) -> Result<String, EnrichError> {
    for name in [old, new] {
        if !IDENTIFIER.is_match(name) {
            return Err(EnrichError::InvalidName {
                name: name.to_string(),
            });
        }
    }
    if old == new {
        return Ok(source.to_string());
    }

    let (targets, collision) = pool::with_parser(language, |parser| {
        let parsed = parser.parse_with_source(source)?;
        let mut targets = Vec::new();
        let mut collision = false;
        visit_identifiers(language, parsed.root_node(), &mut |node| {
            let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
            if text == new {
                collision = true;
            } else if text == old && !is_member_position(node) {
                targets.push((node.start_byte(), node.end_byte()));
            }
        });
        Ok::<_, EnrichError>((targets, collision))
    })??;

    if collision {
        return Err(EnrichError::Collision {
            name: new.to_string(),
        });
    }
    if targets.is_empty() {
        return Err(EnrichError::NotFound {
            name: old.to_string(),
        });
    }

    let edits = targets
        .into_iter()
        .map(|(start, end)| SpanEdit::new(start, end, new, old))
        .collect();
    Ok(apply_edits(source, edits)?)
}

fn visit_identifiers<'t>(language: Language, node: Node<'t>, f: &mut dyn FnMut(Node<'t>)) {
    if is_identifier_kind(language, node.kind()) {
        f(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit_identifiers(language, child, f);
    }
}

/// Insert a documentation comment (or Python docstring) for `symbol`.
pub fn insert_doc(
    language: Language,
    source: &str,
    symbol: &str,
    doc: &str,
) -> Result<String, EnrichError> {
    let doc = doc.split_whitespace().collect::<Vec<_>>().join(" ");
    if doc.is_empty() {
        return Err(EnrichError::Unsupported {
            symbol: symbol.to_string(),
            reason: "empty documentation".to_string(),
        });
    }

    let edit = pool::with_parser(language, |parser| {
        let parsed = parser.parse_with_source(source)?;
        let node = find_definition(language, source, parsed.root_node(), symbol).ok_or_else(
            || EnrichError::NotFound {
                name: symbol.to_string(),
            },
        )?;
        match language {
            Language::Python => python_docstring(source, node, symbol, &doc),
            _ => leading_doc_comment(language, source, node, symbol, &doc),
        }
    })??;

    Ok(apply_edits(source, vec![edit])?)
}

fn python_docstring(
    source: &str,
    node: Node<'_>,
    symbol: &str,
    doc: &str,
) -> Result<SpanEdit, EnrichError> {
    let body = node
        .child_by_field_name("body")
        .ok_or_else(|| EnrichError::Unsupported {
            symbol: symbol.to_string(),
            reason: "definition has no body".to_string(),
        })?;

    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).next();
    if let Some(first) = first {
        let is_docstring = first.kind() == "expression_statement"
            && first
                .named_child(0)
                .is_some_and(|expr| expr.kind() == "string");
        if is_docstring {
            return Err(EnrichError::AlreadyDocumented {
                symbol: symbol.to_string(),
            });
        }
    }

    let line_start = source[..body.start_byte()]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let indent = &source[line_start..body.start_byte()];
    if !indent.chars().all(char::is_whitespace) {
        return Err(EnrichError::Unsupported {
            symbol: symbol.to_string(),
            reason: "body is on the definition line".to_string(),
        });
    }

    let escaped = doc.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    Ok(SpanEdit::insert(
        body.start_byte(),
        format!("\"\"\"{escaped}\"\"\"\n{indent}"),
    ))
}

fn leading_doc_comment(
    language: Language,
    source: &str,
    node: Node<'_>,
    symbol: &str,
    doc: &str,
) -> Result<SpanEdit, EnrichError> {
    // Exported JS/TS declarations start at the `export` keyword
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };

    if let Some(prev) = anchor.prev_sibling() {
        let is_comment = prev.kind().contains("comment");
        let adjacent = prev.end_position().row + 1 >= anchor.start_position().row;
        if is_comment && adjacent {
            return Err(EnrichError::AlreadyDocumented {
                symbol: symbol.to_string(),
            });
        }
    }

    let line_start = source[..anchor.start_byte()]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let prefix = &source[line_start..anchor.start_byte()];
    if !prefix.chars().all(char::is_whitespace) {
        return Err(EnrichError::Unsupported {
            symbol: symbol.to_string(),
            reason: "definition does not start its line".to_string(),
        });
    }

    let comment = match language {
        Language::Rust => format!("{prefix}/// {doc}\n"),
        _ => format!("{prefix}/** {} */\n", doc.replace("*/", "* /")),
    };
    Ok(SpanEdit::insert(line_start, comment))
}
