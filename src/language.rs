//! Language detection and per-language scanning capabilities.
//!
//! Detectors never branch on file extensions themselves. They ask for a
//! [`LanguageProfile`], which bundles the comment syntax and the stub
//! signatures for a language. Files in a language outside the closed set get
//! the generic profile.
//!
//! # Example
//!
//! ```
//! use qgate::language::{Language, LanguageProfile};
//! use std::path::Path;
//!
//! let lang = Language::from_path(Path::new("src/lib.rs"));
//! assert_eq!(lang, Some(Language::Rust));
//!
//! let profile = LanguageProfile::for_language(lang);
//! assert!(profile.comment.line.contains(&"//"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Languages with dedicated scanning capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    Kotlin,
    CSharp,
    C,
    Cpp,
    Ruby,
    Php,
    Swift,
    Shell,
}

static ALL_LANGUAGES: &[Language] = &[
    Language::Rust,
    Language::Python,
    Language::JavaScript,
    Language::TypeScript,
    Language::Go,
    Language::Java,
    Language::Kotlin,
    Language::CSharp,
    Language::C,
    Language::Cpp,
    Language::Ruby,
    Language::Php,
    Language::Swift,
    Language::Shell,
];

impl Language {
    /// Returns all supported languages.
    pub fn all() -> &'static [Language] {
        ALL_LANGUAGES
    }

    /// Returns the file extensions associated with this language.
    ///
    /// Extensions include the leading dot (e.g., ".rs", ".py").
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Rust => &[".rs"],
            Language::Python => &[".py", ".pyi", ".pyw"],
            Language::JavaScript => &[".js", ".jsx", ".mjs", ".cjs"],
            Language::TypeScript => &[".ts", ".tsx", ".mts", ".cts"],
            Language::Go => &[".go"],
            Language::Java => &[".java"],
            Language::Kotlin => &[".kt", ".kts"],
            Language::CSharp => &[".cs"],
            Language::C => &[".c", ".h"],
            Language::Cpp => &[".cpp", ".cc", ".cxx", ".hpp", ".hxx", ".hh"],
            Language::Ruby => &[".rb", ".rake"],
            Language::Php => &[".php"],
            Language::Swift => &[".swift"],
            Language::Shell => &[".sh", ".bash", ".zsh"],
        }
    }

    /// Detect the language of a path from its extension.
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        let dotted = format!(".{}", ext.to_lowercase());
        ALL_LANGUAGES
            .iter()
            .copied()
            .find(|lang| lang.extensions().contains(&dotted.as_str()))
    }

    /// Whether identifiers in this language conventionally use snake_case
    /// for functions.
    pub fn snake_case_functions(&self) -> bool {
        matches!(
            self,
            Language::Rust | Language::Python | Language::Ruby | Language::Shell
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Rust => "Rust",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Go => "Go",
            Language::Java => "Java",
            Language::Kotlin => "Kotlin",
            Language::CSharp => "C#",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Swift => "Swift",
            Language::Shell => "Shell",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// How comments are written in a language.
#[derive(Debug, Clone, Copy)]
pub struct CommentSyntax {
    /// Line comment markers.
    pub line: &'static [&'static str],
    /// Block comment delimiters, if the language has them.
    pub block: Option<(&'static str, &'static str)>,
    /// Characters that open and close string literals.
    pub quotes: &'static [char],
    /// Whether `'x'` is a char literal while a lone `'` is not a quote.
    pub char_literals: bool,
}

/// A regex that recognises a stubbed-out implementation.
#[derive(Debug, Clone, Copy)]
pub struct StubPattern {
    pub id: &'static str,
    pub pattern: &'static str,
    pub weight: f64,
    pub description: &'static str,
}

/// Everything a detector needs to know about a language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    /// `None` for the generic fallback.
    pub language: Option<Language>,
    pub comment: CommentSyntax,
    pub stub_patterns: &'static [StubPattern],
}

const C_STYLE: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &['"', '\'', '`'],
    char_literals: false,
};

const RUST_STYLE: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    // Single quotes are lifetimes as often as chars.
    quotes: &['"'],
    char_literals: true,
};

const HASH_STYLE: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: None,
    quotes: &['"', '\''],
    char_literals: false,
};

const PYTHON_STYLE: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: Some(("\"\"\"", "\"\"\"")),
    quotes: &['"', '\''],
    char_literals: false,
};

const PHP_STYLE: CommentSyntax = CommentSyntax {
    line: &["//", "#"],
    block: Some(("/*", "*/")),
    quotes: &['"', '\''],
    char_literals: false,
};

const GENERIC_STYLE: CommentSyntax = CommentSyntax {
    line: &["//", "#", "--"],
    block: Some(("/*", "*/")),
    quotes: &['"'],
    char_literals: false,
};

const MARKUP_STYLE: CommentSyntax = CommentSyntax {
    line: &[],
    block: Some(("<!--", "-->")),
    quotes: &['"'],
    char_literals: false,
};

const CSS_STYLE: CommentSyntax = CommentSyntax {
    line: &[],
    block: Some(("/*", "*/")),
    quotes: &['"'],
    char_literals: false,
};

const STYLESHEET_STYLE: CommentSyntax = CommentSyntax {
    line: &["//"],
    block: Some(("/*", "*/")),
    quotes: &['"'],
    char_literals: false,
};

const CONFIG_STYLE: CommentSyntax = CommentSyntax {
    line: &["#"],
    block: None,
    quotes: &['"'],
    char_literals: false,
};

/// Comment syntax for files outside the language set, by extension.
fn fallback_comment_syntax(path: &Path) -> CommentSyntax {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" | "xml" | "xhtml" | "vue" | "svelte" | "erb" | "hbs" => MARKUP_STYLE,
        "css" => CSS_STYLE,
        "scss" | "sass" | "less" => STYLESHEET_STYLE,
        "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "properties" | "env" => CONFIG_STYLE,
        _ => GENERIC_STYLE,
    }
}

const NOT_IMPLEMENTED: &str = r"(?i)not\s+(yet\s+)?implemented";

const RUST_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "rust_todo_macro",
        pattern: r"\btodo!\s*\(",
        weight: 0.7,
        description: "todo!() macro",
    },
    StubPattern {
        id: "rust_unimplemented_macro",
        pattern: r"\bunimplemented!\s*\(",
        weight: 0.7,
        description: "unimplemented!() macro",
    },
    StubPattern {
        id: "rust_panic_not_implemented",
        pattern: r#"\bpanic!\s*\(\s*"(?i)[^"]*not\s+(yet\s+)?implemented"#,
        weight: 0.7,
        description: "panic with a not-implemented message",
    },
    StubPattern {
        id: "rust_empty_fn",
        pattern: r"\bfn\s+\w+\s*(<[^>]*>)?\s*\([^)]*\)\s*(->\s*[^{]+)?\{\s*\}",
        weight: 0.3,
        description: "function with an empty body",
    },
];

const PYTHON_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "python_not_implemented_error",
        pattern: r"\braise\s+NotImplementedError\b",
        weight: 0.7,
        description: "raise NotImplementedError",
    },
    StubPattern {
        id: "python_pass_body",
        pattern: r"^\s*def\s+\w+\s*\([^)]*\)\s*(->\s*[^:]+)?:\s*(pass|\.\.\.)\s*$",
        weight: 0.4,
        description: "function body is only pass/...",
    },
];

const JS_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "js_throw_not_implemented",
        pattern: r#"\bthrow\s+new\s+Error\s*\(\s*['"`](?i)[^'"`]*not\s+(yet\s+)?implemented"#,
        weight: 0.7,
        description: "throw new Error('not implemented')",
    },
    StubPattern {
        id: "js_empty_function",
        pattern: r"\bfunction\s+\w+\s*\([^)]*\)\s*\{\s*\}",
        weight: 0.3,
        description: "function with an empty body",
    },
];

const GO_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "go_panic_not_implemented",
        pattern: r#"\bpanic\(\s*"(?i)[^"]*(not\s+(yet\s+)?implemented|todo)"#,
        weight: 0.7,
        description: "panic(\"not implemented\")",
    },
    StubPattern {
        id: "go_empty_func",
        pattern: r"^\s*func\s+(\([^)]*\)\s*)?\w+\s*\([^)]*\)[^{]*\{\s*\}",
        weight: 0.3,
        description: "function with an empty body",
    },
];

const JVM_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "jvm_unsupported_operation",
        pattern: r"\bthrow\s+new\s+(UnsupportedOperationException|NotImplementedException)\b",
        weight: 0.7,
        description: "throw UnsupportedOperationException",
    },
    StubPattern {
        id: "kotlin_todo_call",
        pattern: r"\bTODO\s*\(",
        weight: 0.7,
        description: "Kotlin TODO() call",
    },
];

const CSHARP_STUBS: &[StubPattern] = &[StubPattern {
    id: "csharp_not_implemented",
    pattern: r"\bthrow\s+new\s+NotImplementedException\b",
    weight: 0.7,
    description: "throw new NotImplementedException()",
}];

const C_STUBS: &[StubPattern] = &[StubPattern {
    id: "c_assert_not_implemented",
    pattern: r#"\bassert\s*\(\s*(0|false)\s*&&\s*"(?i)[^"]*not\s+(yet\s+)?implemented"#,
    weight: 0.6,
    description: "assert(0 && \"not implemented\")",
}];

const RUBY_STUBS: &[StubPattern] = &[StubPattern {
    id: "ruby_not_implemented_error",
    pattern: r"\braise\s+NotImplementedError\b",
    weight: 0.7,
    description: "raise NotImplementedError",
}];

const PHP_STUBS: &[StubPattern] = &[StubPattern {
    id: "php_throw_not_implemented",
    pattern: r#"\bthrow\s+new\s+\\?\w*Exception\s*\(\s*['"](?i)[^'"]*not\s+(yet\s+)?implemented"#,
    weight: 0.7,
    description: "throw new Exception('not implemented')",
}];

const SWIFT_STUBS: &[StubPattern] = &[StubPattern {
    id: "swift_fatal_error",
    pattern: r#"\bfatalError\s*\(\s*"(?i)[^"]*not\s+(yet\s+)?implemented"#,
    weight: 0.7,
    description: "fatalError(\"not implemented\")",
}];

const GENERIC_STUBS: &[StubPattern] = &[
    StubPattern {
        id: "generic_not_implemented",
        pattern: NOT_IMPLEMENTED,
        weight: 0.4,
        description: "not-implemented marker",
    },
    StubPattern {
        id: "generic_placeholder_return",
        pattern: r#"(?i)\breturn\s+['"](placeholder|dummy|fake|stub|lorem ipsum)"#,
        weight: 0.5,
        description: "returns a placeholder value",
    },
];

impl LanguageProfile {
    /// Capability lookup for a (possibly unknown) language.
    pub fn for_language(language: Option<Language>) -> LanguageProfile {
        let Some(lang) = language else {
            return Self::generic();
        };

        let (comment, stub_patterns) = match lang {
            Language::Rust => (RUST_STYLE, RUST_STUBS),
            Language::Python => (PYTHON_STYLE, PYTHON_STUBS),
            Language::JavaScript | Language::TypeScript => (C_STYLE, JS_STUBS),
            Language::Go => (C_STYLE, GO_STUBS),
            Language::Java | Language::Kotlin => (C_STYLE, JVM_STUBS),
            Language::CSharp => (C_STYLE, CSHARP_STUBS),
            Language::C | Language::Cpp => (C_STYLE, C_STUBS),
            Language::Ruby => (HASH_STYLE, RUBY_STUBS),
            Language::Php => (PHP_STYLE, PHP_STUBS),
            Language::Swift => (C_STYLE, SWIFT_STUBS),
            Language::Shell => (HASH_STYLE, &[] as &[StubPattern]),
        };

        LanguageProfile {
            language: Some(lang),
            comment,
            stub_patterns,
        }
    }

    /// Fallback for files outside the closed language set.
    pub fn generic() -> LanguageProfile {
        LanguageProfile {
            language: None,
            comment: GENERIC_STYLE,
            stub_patterns: GENERIC_STUBS,
        }
    }

    /// Profile for a path.
    ///
    /// Markup, stylesheet and config files keep the generic stub patterns
    /// but use their own comment syntax.
    pub fn for_path(path: &Path) -> LanguageProfile {
        match Language::from_path(path) {
            Some(lang) => Self::for_language(Some(lang)),
            None => LanguageProfile {
                comment: fallback_comment_syntax(path),
                ..Self::generic()
            },
        }
    }

    /// Stub patterns that apply to every language in addition to its own.
    pub fn shared_stub_patterns() -> &'static [StubPattern] {
        GENERIC_STUBS
    }
}

// ============================================================================
// Comment Splitting
// ============================================================================

/// One source line split into code and comment text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineParts {
    pub code: String,
    pub comment: String,
}

impl LineParts {
    /// Whether this line carries any comment text.
    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }
}

/// Splits lines into code and comment, tracking block comments across lines.
#[derive(Debug, Clone)]
pub struct CommentScanner {
    syntax: CommentSyntax,
    in_block: bool,
}

impl CommentScanner {
    pub fn new(syntax: CommentSyntax) -> Self {
        Self {
            syntax,
            in_block: false,
        }
    }

    /// Split the next line of a file.
    pub fn split(&mut self, line: &str) -> LineParts {
        let mut parts = LineParts::default();
        let mut rest = line;
        let mut in_string: Option<char> = None;

        while !rest.is_empty() {
            if self.in_block {
                let Some((_, end)) = self.syntax.block else {
                    self.in_block = false;
                    continue;
                };
                match rest.find(end) {
                    Some(pos) => {
                        parts.comment.push_str(&rest[..pos]);
                        parts.comment.push(' ');
                        rest = &rest[pos + end.len()..];
                        self.in_block = false;
                    }
                    None => {
                        parts.comment.push_str(rest);
                        rest = "";
                    }
                }
                continue;
            }

            if let Some(quote) = in_string {
                let mut chars = rest.char_indices();
                let mut consumed = rest.len();
                while let Some((i, c)) = chars.next() {
                    if c == '\\' {
                        chars.next();
                        continue;
                    }
                    if c == quote {
                        consumed = i + c.len_utf8();
                        in_string = None;
                        break;
                    }
                }
                parts.code.push_str(&rest[..consumed]);
                rest = &rest[consumed..];
                continue;
            }

            if let Some(marker) = self.syntax.line.iter().find(|m| rest.starts_with(**m)) {
                parts.comment.push_str(&rest[marker.len()..]);
                break;
            }

            if let Some((start, _)) = self.syntax.block {
                if rest.starts_with(start) {
                    self.in_block = true;
                    rest = &rest[start.len()..];
                    continue;
                }
            }

            let Some(c) = rest.chars().next() else {
                break;
            };
            if c == '\'' && self.syntax.char_literals {
                let len = char_literal_len(rest).unwrap_or(1);
                parts.code.push_str(&rest[..len]);
                rest = &rest[len..];
                continue;
            }
            if self.syntax.quotes.contains(&c) {
                in_string = Some(c);
            }
            parts.code.push(c);
            rest = &rest[c.len_utf8()..];
        }

        parts
    }
}

/// Byte length of a char literal at the start of `rest`, or `None` when the
/// quote opens a lifetime or label.
fn char_literal_len(rest: &str) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1);
    let (_, first) = chars.next()?;
    if first == '\\' {
        chars.next()?;
        // `\u{..}` escapes run up to eight more chars.
        return chars.take(8).find(|(_, c)| *c == '\'').map(|(i, _)| i + 1);
    }
    let (i, c) = chars.next()?;
    (c == '\'').then_some(i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path(Path::new("a/b.rs")), Some(Language::Rust));
        assert_eq!(Language::from_path(Path::new("x.TSX")), Some(Language::TypeScript));
        assert_eq!(Language::from_path(Path::new("README.md")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_unknown_language_gets_generic_profile() {
        let profile = LanguageProfile::for_path(Path::new("script.lua"));
        assert!(profile.language.is_none());
        assert!(profile.comment.line.contains(&"--"));
        assert!(!profile.stub_patterns.is_empty());
    }

    #[test]
    fn test_every_stub_pattern_compiles() {
        let mut profiles: Vec<LanguageProfile> = Language::all()
            .iter()
            .map(|l| LanguageProfile::for_language(Some(*l)))
            .collect();
        profiles.push(LanguageProfile::generic());

        for profile in profiles {
            for stub in profile.stub_patterns {
                assert!(
                    regex::Regex::new(stub.pattern).is_ok(),
                    "pattern {} failed to compile",
                    stub.id
                );
            }
        }
    }

    #[test]
    fn test_split_line_comment() {
        let mut scanner = CommentScanner::new(RUST_STYLE);
        let parts = scanner.split("let x = 1; // TODO: fix");
        assert_eq!(parts.code, "let x = 1; ");
        assert_eq!(parts.comment, " TODO: fix");
    }

    #[test]
    fn test_split_ignores_markers_in_strings() {
        let mut scanner = CommentScanner::new(C_STYLE);
        let parts = scanner.split(r#"const url = "http://example.com"; // real"#);
        assert!(parts.code.contains("http://example.com"));
        assert_eq!(parts.comment, " real");
    }

    #[test]
    fn test_block_comment_spans_lines() {
        let mut scanner = CommentScanner::new(C_STYLE);
        let first = scanner.split("int a; /* start of");
        let second = scanner.split("   still comment */ int b;");
        let third = scanner.split("int c;");

        assert_eq!(first.code.trim(), "int a;");
        assert!(first.comment.contains("start of"));
        assert!(second.comment.contains("still comment"));
        assert_eq!(second.code.trim(), "int b;");
        assert!(!third.has_comment());
    }

    #[test]
    fn test_rust_lifetime_is_not_a_string() {
        let mut scanner = CommentScanner::new(RUST_STYLE);
        let parts = scanner.split("fn f<'a>(x: &'a str) {} // done");
        assert_eq!(parts.comment, " done");
    }

    #[test]
    fn test_rust_char_literals_are_not_strings() {
        let mut scanner = CommentScanner::new(RUST_STYLE);
        let parts = scanner.split(r#"let q = '"'; // TODO: escape quotes"#);
        assert_eq!(parts.code, r#"let q = '"'; "#);
        assert_eq!(parts.comment, " TODO: escape quotes");

        let parts = scanner.split(r"if c == '\'' || c == '\u{201C}' { skip() } // TODO: smart quotes");
        assert_eq!(parts.comment, " TODO: smart quotes");

        let parts = scanner.split(r#"fn g<'a>(s: &'a str) -> &'static str { "x" } // done"#);
        assert_eq!(parts.comment, " done");
    }

    #[test]
    fn test_markup_and_config_comment_syntax() {
        let html = LanguageProfile::for_path(Path::new("templates/index.html"));
        assert!(html.language.is_none());
        let mut scanner = CommentScanner::new(html.comment);
        let parts = scanner.split("<div>Don't panic</div> <!-- TODO: wire form -->");
        assert_eq!(parts.comment.trim(), "TODO: wire form");
        assert!(parts.code.contains("Don't panic"));

        let yaml = LanguageProfile::for_path(Path::new(".github/workflows/ci.yml"));
        let mut scanner = CommentScanner::new(yaml.comment);
        let parts = scanner.split("run: cargo test  # TODO: add clippy");
        assert_eq!(parts.comment.trim(), "TODO: add clippy");
        assert_eq!(yaml.stub_patterns.len(), LanguageProfile::generic().stub_patterns.len());
    }

    #[test]
    fn test_python_docstring_is_comment() {
        let mut scanner = CommentScanner::new(PYTHON_STYLE);
        let parts = scanner.split(r#"    """Temporary solution for now.""""#);
        assert!(parts.comment.contains("Temporary solution"));
        assert!(parts.code.trim().is_empty());
    }
}
