//! Naming gate.
//!
//! Flags names that describe a revision instead of a responsibility
//! (`enhanced_parser.rs`, `UserServiceV2`, `handle_request_new`) and symbols
//! that break their language's casing convention.

use anyhow::Context as _;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use super::{display_path, Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::NamingConfig;
use crate::language::{CommentScanner, Language, LanguageProfile};
use crate::scope::FileSet;

pub const RULE_BANNED_FILENAME: &str = "BANNED_MODIFIER_FILENAME";
pub const RULE_BANNED_SYMBOL: &str = "BANNED_MODIFIER_SYMBOL";
pub const RULE_CONVENTION: &str = "SYMBOL_CONVENTION";

/// Python test-framework hooks that are camelCase by necessity.
const PYTHON_FRAMEWORK_HOOKS: &[&str] = &[
    "setUp",
    "tearDown",
    "setUpClass",
    "tearDownClass",
    "setUpModule",
    "tearDownModule",
    "asyncSetUp",
    "asyncTearDown",
];

/// Keywords that can follow a type keyword (`class func` in Swift).
const DECLARATION_KEYWORDS: &[&str] = &["func", "var", "let", "fun", "val", "static"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Function,
    Type,
}

impl SymbolKind {
    fn label(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Snake,
    Pascal,
    CamelOrPascal,
}

impl Case {
    fn matches(self, name: &str) -> bool {
        let core = name.trim_start_matches('_').trim_end_matches(['?', '!', '=']);
        if core.is_empty() {
            return true;
        }
        match self {
            Case::Snake => core
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
            Case::Pascal => {
                core.starts_with(|c: char| c.is_ascii_uppercase()) && !core.contains('_')
            }
            Case::CamelOrPascal => {
                core.len() == 1
                    || (!core.contains('_') && core.chars().any(|c| c.is_ascii_lowercase()))
            }
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Case::Snake => "snake_case",
            Case::Pascal => "PascalCase",
            Case::CamelOrPascal => "camelCase",
        }
    }
}

/// Declaration patterns per language; each captures `name`.
fn declaration_patterns(language: Language) -> &'static [(SymbolKind, &'static str)] {
    use SymbolKind::{Function, Type};
    match language {
        Language::Rust => &[
            (
                Function,
                r"^\s*(pub(\([^)]*\))?\s+)?(const\s+)?(async\s+)?(unsafe\s+)?(extern\s+\S+\s+)?fn\s+(?P<name>[A-Za-z_]\w*)",
            ),
            (
                Type,
                r"^\s*(pub(\([^)]*\))?\s+)?(struct|enum|trait|union)\s+(?P<name>[A-Za-z_]\w*)",
            ),
        ],
        Language::Python => &[
            (Function, r"^\s*(async\s+)?def\s+(?P<name>[A-Za-z_]\w*)"),
            (Type, r"^\s*class\s+(?P<name>[A-Za-z_]\w*)"),
        ],
        Language::Ruby => &[
            (Function, r"^\s*def\s+(self\.)?(?P<name>[A-Za-z_]\w*[?!=]?)"),
            (Type, r"^\s*(class|module)\s+(?P<name>[A-Z]\w*)"),
        ],
        Language::JavaScript | Language::TypeScript => &[
            (Function, r"\bfunction\s*\*?\s+(?P<name>[A-Za-z_$][\w$]*)"),
            (Type, r"^\s*(export\s+)?(default\s+)?(abstract\s+)?(class|interface)\s+(?P<name>[A-Za-z_$][\w$]*)"),
        ],
        Language::Go => &[
            (Function, r"^\s*func\s+(\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)"),
            (Type, r"^\s*type\s+(?P<name>[A-Za-z_]\w*)\s+(struct|interface)\b"),
        ],
        Language::Kotlin => &[
            (Function, r"\bfun\s+(<[^>]*>\s*)?(?P<name>[A-Za-z_]\w*)"),
            (Type, r"\b(class|interface|object)\s+(?P<name>[A-Za-z_]\w*)"),
        ],
        Language::Swift => &[
            (Function, r"\bfunc\s+(?P<name>[A-Za-z_]\w*)"),
            (Type, r"\b(class|struct|enum|protocol)\s+(?P<name>[A-Za-z_]\w*)"),
        ],
        Language::Java | Language::CSharp => &[(
            Type,
            r"\b(class|interface|enum|record)\s+(?P<name>[A-Za-z_]\w*)",
        )],
        Language::Php => &[(Type, r"^\s*(abstract\s+|final\s+)?(class|interface|trait)\s+(?P<name>[A-Za-z_]\w*)")],
        Language::Shell => &[(Function, r"^\s*function\s+(?P<name>[A-Za-z_][\w-]*)")],
        Language::C | Language::Cpp => &[],
    }
}

fn expected_case(language: Language, kind: SymbolKind) -> Option<Case> {
    match (kind, language) {
        (SymbolKind::Function, Language::Shell) => None,
        (SymbolKind::Function, lang) if lang.snake_case_functions() => Some(Case::Snake),
        (SymbolKind::Function, _) => Some(Case::CamelOrPascal),
        (SymbolKind::Type, Language::Go) => Some(Case::CamelOrPascal),
        (SymbolKind::Type, _) => Some(Case::Pascal),
    }
}

/// Split an identifier or file stem into lowercase words.
///
/// Handles `snake_case`, `kebab-case`, dotted stems and camelCase, keeping
/// acronyms together (`HTTPServerV2` gives `http`, `server`, `v2`).
pub fn name_segments(name: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for part in name.split(|c: char| !c.is_alphanumeric()) {
        let chars: Vec<char> = part.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            let boundary = i > 0 && c.is_uppercase() && {
                let prev = chars[i - 1];
                let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower)
            };
            if boundary && !current.is_empty() {
                segments.push(std::mem::take(&mut current).to_lowercase());
            }
            current.push(c);
        }
        if !current.is_empty() {
            segments.push(current.to_lowercase());
        }
    }
    segments
}

/// Detector for the naming gate.
pub struct NamingDetector {
    config: NamingConfig,
}

impl NamingDetector {
    pub fn new(config: NamingConfig) -> Self {
        Self { config }
    }

    fn banned_in<'a>(&self, segments: &'a [String]) -> Option<&'a String> {
        if segments.len() < 2 {
            return None;
        }
        segments.iter().find(|s| {
            self.config
                .banned_modifiers
                .iter()
                .any(|b| b.eq_ignore_ascii_case(s))
        })
    }

    fn check_file_name(&self, path: &Path) -> Option<Finding> {
        let stem = path.file_stem()?.to_str()?;
        let segments = name_segments(stem);
        let modifier = self.banned_in(&segments)?;

        let kept: Vec<&str> = segments
            .iter()
            .filter(|s| *s != modifier)
            .map(String::as_str)
            .collect();
        let mut finding = Finding::new(
            GateName::Naming,
            RULE_BANNED_FILENAME,
            format!(
                "File name '{}' carries the modifier '{}'; name files after their responsibility",
                stem, modifier
            ),
            display_path(path),
        )
        .with_severity(FindingSeverity::Error);
        if !kept.is_empty() {
            finding = finding.with_suggestion(format!(
                "Rename to describe what it does, e.g. '{}'",
                kept.join("_")
            ));
        }
        Some(finding)
    }

    /// Banned modifiers in a symbol name.
    ///
    /// Types are checked on every segment. Functions only on the trailing
    /// segment, since leading verbs like `copy_into` or `new_with_capacity`
    /// are idiomatic.
    fn symbol_modifier(&self, kind: SymbolKind, name: &str) -> Option<String> {
        let segments = name_segments(name);
        match kind {
            SymbolKind::Type => self.banned_in(&segments).cloned(),
            SymbolKind::Function => {
                if segments.len() < 2 {
                    return None;
                }
                let last = segments.last()?;
                self.config
                    .banned_modifiers
                    .iter()
                    .any(|b| b.eq_ignore_ascii_case(last))
                    .then(|| last.clone())
            }
        }
    }

    fn check_symbols(&self, source: &SourceFile, rules: &CompiledRules) -> Vec<Finding> {
        let Some(language) = Language::from_path(&source.path) else {
            return Vec::new();
        };
        let Some(patterns) = rules.get(&language) else {
            return Vec::new();
        };

        let mut scanner = CommentScanner::new(LanguageProfile::for_language(Some(language)).comment);
        let mut findings = Vec::new();

        for (idx, line) in source.content.lines().enumerate() {
            let code = scanner.split(line).code;
            if code.trim().is_empty() {
                continue;
            }
            let line_no = (idx + 1) as u32;

            for (kind, re) in patterns {
                let Some(name) = re.captures(&code).and_then(|c| c.name("name")) else {
                    continue;
                };
                let name = name.as_str();
                if *kind == SymbolKind::Type && DECLARATION_KEYWORDS.contains(&name) {
                    continue;
                }

                if let Some(modifier) = self.symbol_modifier(*kind, name) {
                    findings.push(
                        Finding::new(
                            GateName::Naming,
                            RULE_BANNED_SYMBOL,
                            format!(
                                "{} '{}' carries the modifier '{}'",
                                capitalize(kind.label()),
                                name,
                                modifier
                            ),
                            source.display.clone(),
                        )
                        .with_line(line_no)
                        .with_severity(FindingSeverity::Error),
                    );
                }

                if language == Language::Python && PYTHON_FRAMEWORK_HOOKS.contains(&name) {
                    continue;
                }
                if let Some(case) = expected_case(language, *kind) {
                    if !case.matches(name) {
                        findings.push(
                            Finding::new(
                                GateName::Naming,
                                RULE_CONVENTION,
                                format!(
                                    "{} {} '{}' should be {}",
                                    language,
                                    kind.label(),
                                    name,
                                    case.describe()
                                ),
                                source.display.clone(),
                            )
                            .with_line(line_no)
                            .with_severity(FindingSeverity::Warning),
                        );
                    }
                }
            }
        }

        findings
    }
}

type CompiledRules = HashMap<Language, Vec<(SymbolKind, Regex)>>;

fn compile_rules() -> anyhow::Result<CompiledRules> {
    let mut rules = HashMap::new();
    for language in Language::all() {
        let compiled = declaration_patterns(*language)
            .iter()
            .map(|(kind, pattern)| {
                Regex::new(pattern)
                    .with_context(|| format!("Failed to compile {} declaration pattern", language))
                    .map(|re| (*kind, re))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        if !compiled.is_empty() {
            rules.insert(*language, compiled);
        }
    }
    Ok(rules)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Detector for NamingDetector {
    fn gate(&self) -> GateName {
        GateName::Naming
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let mut findings: Vec<Finding> = files
            .iter()
            .filter_map(|p| self.check_file_name(p))
            .collect();

        if self.config.check_symbols {
            let rules = compile_rules()?;
            let sources = SourceLoader::default()
                .load(GateName::Naming, files, |p| Language::from_path(p).is_some())
                .await;
            for source in &sources {
                findings.extend(self.check_symbols(source, &rules));
                tokio::task::yield_now().await;
            }
        }

        Ok(ScanResult::new(findings))
    }
}
