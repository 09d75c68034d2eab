//! Line-level heuristics for telling code apart from prose in model output.

use crate::lang::language::Language;
use once_cell::sync::Lazy;
use regex::Regex;

/// What code in one language looks like, for the response sanitizer.
#[derive(Debug)]
pub struct CodeShape {
    /// Matches text that plausibly contains code.
    signal: Regex,
    /// Prefixes (after trimming) that mark a code line.
    line_prefixes: &'static [&'static str],
    /// Suffixes (after trimming) that mark a code line.
    line_suffixes: &'static [&'static str],
    /// Unindented lines with this prefix are not code (`# Heading` is markdown).
    comment_prefix: &'static str,
}

impl CodeShape {
    fn new(
        signal: &str,
        line_prefixes: &'static [&'static str],
        line_suffixes: &'static [&'static str],
        comment_prefix: &'static str,
    ) -> Self {
        Self {
            signal: Regex::new(signal).expect("code signal regex is valid"),
            line_prefixes,
            line_suffixes,
            comment_prefix,
        }
    }

    /// Built-in shape for `language`.
    pub fn for_language(language: Language) -> &'static CodeShape {
        match language {
            Language::Python => &PYTHON,
            Language::JavaScript => &JAVASCRIPT,
            Language::TypeScript => &TYPESCRIPT,
            Language::Java => &JAVA,
            Language::C | Language::Cpp => &C_FAMILY,
            Language::Rust => &RUST,
        }
    }

    /// Does `text` contain something that looks like code?
    pub fn looks_like_code(&self, text: &str) -> bool {
        self.signal.is_match(text)
    }

    /// Does this line start with the language's line comment marker?
    pub fn is_comment_line(&self, line: &str) -> bool {
        !self.comment_prefix.is_empty() && line.trim_start().starts_with(self.comment_prefix)
    }

    /// Is this single line shaped like code?
    ///
    /// Indented lines and assignments count, because model chatter is
    /// almost never indented and rarely contains `=`.
    pub fn is_code_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            return true;
        }
        if !self.comment_prefix.is_empty() && trimmed.starts_with(self.comment_prefix) {
            return false;
        }
        // Closing brackets left at column zero, e.g. the end of a call
        if trimmed.chars().all(|c| matches!(c, ')' | ']' | '}' | ',' | ';' | ':')) {
            return true;
        }
        self.line_prefixes.iter().any(|p| trimmed.starts_with(p))
            || self.line_suffixes.iter().any(|s| trimmed.ends_with(s))
            || trimmed.contains('=')
    }
}

static PYTHON: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"def\s+\w+|class\s+\w+|import\s+\w+|return\s+",
        &[
            "def ", "class ", "import ", "from ", "return", "print(", "if ", "elif ", "else:",
            "for ", "while ", "try:", "except", "finally:", "with ", "@", "async ", "raise ",
            "assert ", "pass", "yield",
        ],
        &[],
        "#",
    )
});

const JS_PREFIXES: &[&str] = &[
    "function ", "function*", "const ", "let ", "var ", "import ", "export ", "class ", "if ",
    "if(", "for ", "for(", "while ", "return", "console.", "async ", "await ", "switch ",
    "try ", "try{", "}", "module.exports",
];

static JAVASCRIPT: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"function\s+\w+|const\s+\w+|let\s+\w+|var\s+\w+|class\s+\w+|=>",
        JS_PREFIXES,
        &["{", "}", ";", "},", "];"],
        "",
    )
});

static TYPESCRIPT: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"function\s+\w+|const\s+\w+|let\s+\w+|class\s+\w+|interface\s+\w+|type\s+\w+\s*=|=>",
        &[
            "function ", "const ", "let ", "var ", "import ", "export ", "class ", "interface ",
            "type ", "enum ", "if ", "if(", "for ", "while ", "return", "async ", "}",
        ],
        &["{", "}", ";", "},", "];"],
        "",
    )
});

static JAVA: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"public\s+class|private\s+\w+|public\s+\w+|class\s+\w+|import\s+[\w.]+;",
        &[
            "public ", "private ", "protected ", "static ", "final ", "class ", "interface ",
            "enum ", "import ", "package ", "@", "return", "if ", "if(", "for ", "while ", "}",
        ],
        &["{", "}", ";"],
        "",
    )
});

static C_FAMILY: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"#include|\w+\s+\**\w+\s*\([^)]*\)\s*\{|struct\s+\w+|class\s+\w+|return\s+",
        &[
            "#include", "#define", "#if", "#else", "#endif", "#pragma", "int ", "void ",
            "char ", "float ", "double ", "long ", "unsigned ", "static ", "const ", "struct ",
            "class ", "namespace ", "template", "using ", "typedef ", "return", "if ", "if(",
            "for ", "while ", "}", "std::",
        ],
        &["{", "}", ";"],
        "",
    )
});

static RUST: Lazy<CodeShape> = Lazy::new(|| {
    CodeShape::new(
        r"fn\s+\w+|struct\s+\w+|enum\s+\w+|impl\b|use\s+[\w:]+|let\s+\w+|mod\s+\w+",
        &[
            "fn ", "pub ", "use ", "mod ", "struct ", "enum ", "impl", "trait ", "let ",
            "const ", "static ", "#[", "#![", "type ", "match ", "if ", "for ", "while ",
            "loop", "return", "}", "//",
        ],
        &["{", "}", ";"],
        "",
    )
});
