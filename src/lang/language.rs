use ast_grep_language::SupportLang;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Languages with a built-in syntax adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    Rust,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Java,
        Language::C,
        Language::Cpp,
        Language::Rust,
    ];

    /// Canonical identifier used in requests and configuration.
    pub fn identifier(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Rust => "rust",
        }
    }

    /// Human-readable name used in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Rust => "Rust",
        }
    }

    /// Extra identifiers accepted for this language.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Language::Python => &["py", "python3"],
            Language::JavaScript => &["js", "jsx", "node"],
            Language::TypeScript => &["ts", "tsx"],
            Language::Java => &[],
            Language::C => &["h"],
            Language::Cpp => &["c++", "cc", "cxx", "hpp"],
            Language::Rust => &["rs"],
        }
    }

    /// Resolve an identifier or alias, case-insensitively.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let needle = identifier.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.identifier() == needle || lang.aliases().contains(&needle.as_str()))
    }

    /// Resolve a file extension (with or without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "py" | "pyw" | "pyi" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "java" => Some(Language::Java),
            "c" | "h" => Some(Language::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Some(Language::Cpp),
            "rs" => Some(Language::Rust),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Grammar used for parsing and pattern matching.
    pub fn support_lang(self) -> SupportLang {
        match self {
            Language::Python => SupportLang::Python,
            Language::JavaScript => SupportLang::JavaScript,
            Language::TypeScript => SupportLang::TypeScript,
            Language::Java => SupportLang::Java,
            Language::C => SupportLang::C,
            Language::Cpp => SupportLang::Cpp,
            Language::Rust => SupportLang::Rust,
        }
    }

    /// Info strings a model may put on a fenced block of this language.
    pub fn fence_tags(self) -> &'static [&'static str] {
        match self {
            Language::Python => &["python", "py", "python3"],
            Language::JavaScript => &["javascript", "js", "jsx"],
            Language::TypeScript => &["typescript", "ts", "tsx"],
            Language::Java => &["java"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "c++", "cc", "hpp"],
            Language::Rust => &["rust", "rs"],
        }
    }

    /// Preferred fence tag when embedding code in a prompt.
    pub fn fence_tag(self) -> &'static str {
        self.fence_tags()[0]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(s).ok_or_else(|| format!("unsupported language: {s}"))
    }
}
