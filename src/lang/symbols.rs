//! Top-level symbol extraction (functions, classes, types).

use crate::lang::language::Language;
use crate::pool;
use serde::Serialize;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Interface,
    Trait,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based, inclusive.
    pub line_start: usize,
    pub line_end: usize,
    pub byte_start: usize,
}

/// Node kinds that introduce a named definition, per grammar.
fn definition_kind(language: Language, node_kind: &str) -> Option<SymbolKind> {
    use SymbolKind::*;
    match (language, node_kind) {
        (Language::Python, "function_definition") => Some(Function),
        (Language::Python, "class_definition") => Some(Class),

        (Language::JavaScript | Language::TypeScript, "function_declaration")
        | (Language::JavaScript | Language::TypeScript, "generator_function_declaration") => {
            Some(Function)
        }
        (Language::JavaScript | Language::TypeScript, "method_definition") => Some(Method),
        (Language::JavaScript | Language::TypeScript, "class_declaration") => Some(Class),
        (Language::TypeScript, "interface_declaration") => Some(Interface),
        (Language::TypeScript, "enum_declaration") => Some(Enum),

        (Language::Java, "method_declaration") | (Language::Java, "constructor_declaration") => {
            Some(Method)
        }
        (Language::Java, "class_declaration") => Some(Class),
        (Language::Java, "interface_declaration") => Some(Interface),
        (Language::Java, "enum_declaration") => Some(Enum),

        (Language::C | Language::Cpp, "function_definition") => Some(Function),
        (Language::C | Language::Cpp, "struct_specifier") => Some(Struct),
        (Language::Cpp, "class_specifier") => Some(Class),

        (Language::Rust, "function_item") => Some(Function),
        (Language::Rust, "struct_item") => Some(Struct),
        (Language::Rust, "enum_item") => Some(Enum),
        (Language::Rust, "trait_item") => Some(Trait),
        _ => None,
    }
}

/// Like [`definition_kind`], but C/C++ type specifiers only count when they
/// carry a body (`struct P p;` is a use, not a definition).
fn defining_kind(language: Language, node: Node<'_>) -> Option<SymbolKind> {
    let kind = definition_kind(language, node.kind())?;
    let is_specifier = matches!(node.kind(), "struct_specifier" | "class_specifier");
    if is_specifier && node.child_by_field_name("body").is_none() {
        return None;
    }
    Some(kind)
}

/// Node kinds whose nested functions are methods.
fn is_type_body_owner(language: Language, node_kind: &str) -> bool {
    matches!(
        (language, node_kind),
        (Language::Python, "class_definition")
            | (Language::Cpp, "class_specifier")
            | (Language::Cpp, "struct_specifier")
            | (Language::Rust, "impl_item")
            | (Language::Rust, "trait_item")
    )
}

/// Extract named definitions. Unparseable input yields whatever the
/// recovered tree still contains.
pub fn extract_symbols(language: Language, source: &str) -> Vec<Symbol> {
    pool::with_parser(language, |parser| {
        let Ok(parsed) = parser.parse_with_source(source) else {
            return Vec::new();
        };
        let mut symbols = Vec::new();
        collect(language, source, parsed.root_node(), false, &mut symbols);
        symbols
    })
    .unwrap_or_default()
}

fn collect(
    language: Language,
    source: &str,
    node: Node<'_>,
    in_type_body: bool,
    out: &mut Vec<Symbol>,
) {
    if let Some(mut kind) = defining_kind(language, node) {
        if kind == SymbolKind::Function && in_type_body {
            kind = SymbolKind::Method;
        }
        if let Some(name) = definition_name(language, node, source) {
            out.push(Symbol {
                name: name.to_string(),
                kind,
                line_start: node.start_position().row + 1,
                line_end: node.end_position().row + 1,
                byte_start: node.start_byte(),
            });
        }
    }

    let nested_in_type = in_type_body || is_type_body_owner(language, node.kind());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(language, source, child, nested_in_type, out);
    }
}

/// Find the definition node for `name`, if any.
pub(crate) fn find_definition<'t>(
    language: Language,
    source: &str,
    root: Node<'t>,
    name: &str,
) -> Option<Node<'t>> {
    if defining_kind(language, root).is_some()
        && definition_name(language, root, source) == Some(name)
    {
        return Some(root);
    }
    let mut cursor = root.walk();
    let children: Vec<_> = root.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(|child| find_definition(language, source, child, name))
}

fn definition_name<'s>(language: Language, node: Node<'_>, source: &'s str) -> Option<&'s str> {
    if let Some(name) = node.child_by_field_name("name") {
        return name.utf8_text(source.as_bytes()).ok();
    }
    if matches!(language, Language::C | Language::Cpp) {
        return declarator_name(node, source);
    }
    None
}

/// C declarators nest: `int *(*f)(void)` is pointer -> function -> identifier.
fn declarator_name<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    let mut current = node.child_by_field_name("declarator");
    while let Some(decl) = current {
        match decl.kind() {
            "identifier" | "field_identifier" | "qualified_identifier" | "destructor_name"
            | "operator_name" | "type_identifier" => {
                return decl.utf8_text(source.as_bytes()).ok();
            }
            _ => {
                current = decl.child_by_field_name("declarator").or_else(|| {
                    let mut cursor = decl.walk();
                    let first = decl.named_children(&mut cursor).next();
                    first
                });
            }
        }
    }
    None
}
