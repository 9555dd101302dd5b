//! Placeholder-governance gate.
//!
//! Enforces "no silent omission": incomplete work must be declared as a
//! [`Placeholder`], and declared degradation must stay bounded. Declarations
//! come from two places:
//!
//! - **Agent artifacts**: JSON documents with a `placeholders` array and a
//!   `status` (`"degraded"` when anything is declared).
//! - **Inline declarations**: a source comment of the form
//!   `// @placeholder {"id": "...", "scope": "...", ...}` which governs the
//!   next `coverage_window` lines.
//!
//! Checks, each with its own rule id:
//!
//! | Rule | Check |
//! |------|-------|
//! | `PLACEHOLDER_SCHEMA` | every declaration has all required fields |
//! | `REGISTRY_MISMATCH` | `status: degraded` iff placeholders are present |
//! | `DEBT_BUDGET` | count and weighted debt per artifact stay under caps |
//! | `DANGLING_PROMISE` | "TODO" / "later" / "coming soon" text has a covering declaration |
//! | `NON_DEGRADABLE_SCOPE` | no placeholders in critical scopes |
//! | `PLACEHOLDER_EXPIRED` | declarations past their expiry |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use super::{Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::PlaceholderConfig;
use crate::gates::source::is_prose_or_data;
use crate::language::{CommentScanner, LanguageProfile};
use crate::scope::FileSet;

pub const RULE_SCHEMA: &str = "PLACEHOLDER_SCHEMA";
pub const RULE_REGISTRY: &str = "REGISTRY_MISMATCH";
pub const RULE_DEBT: &str = "DEBT_BUDGET";
pub const RULE_DANGLING: &str = "DANGLING_PROMISE";
pub const RULE_NON_DEGRADABLE: &str = "NON_DEGRADABLE_SCOPE";
pub const RULE_EXPIRED: &str = "PLACEHOLDER_EXPIRED";

/// Marker that introduces an inline declaration.
pub const INLINE_MARKER: &str = "@placeholder";

/// Artifact status that must accompany declared placeholders.
pub const DEGRADED_STATUS: &str = "degraded";

/// Text that promises future work.
const PROMISE_PATTERN: &str = r"(?i)\b(todo|tbd|fixme)\b|\bcoming soon\b|\b(do|implement|add|fix|handle|finish|support|revisit|address|complete|wire)\w*\b[^.;]*\blater\b|\b(will|to) be (added|implemented|done|supported|completed)\b|\bin a future (release|version|iteration)\b";

// ============================================================================
// Placeholder Model
// ============================================================================

/// How much a declared degradation hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    NonBlocking,
    Partial,
    BlocksAcceptance,
}

impl Impact {
    pub fn parse(s: &str) -> Option<Impact> {
        match s.trim() {
            "non_blocking" => Some(Impact::NonBlocking),
            "partial" => Some(Impact::Partial),
            "blocks_acceptance" => Some(Impact::BlocksAcceptance),
            _ => None,
        }
    }

    /// Debt weight under the given configuration.
    pub fn weight(&self, config: &PlaceholderConfig) -> u32 {
        match self {
            Impact::NonBlocking => config.weight_non_blocking,
            Impact::Partial => config.weight_partial,
            Impact::BlocksAcceptance => config.weight_blocks_acceptance,
        }
    }
}

/// A declared degradation, as written. Validation happens separately so that
/// malformed declarations can be reported instead of rejected by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: Option<String>,
    pub scope: Option<String>,
    pub reason: Option<String>,
    pub impact: Option<String>,
    pub fallback: Option<String>,
    #[serde(alias = "debtNote")]
    pub debt_note: Option<String>,
    pub expiry: Option<String>,
}

impl Placeholder {
    /// Schema problems; empty when the declaration is well formed.
    pub fn schema_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let required = [
            ("id", &self.id),
            ("scope", &self.scope),
            ("reason", &self.reason),
            ("impact", &self.impact),
            ("fallback", &self.fallback),
        ];
        for (name, value) in required {
            if value.as_deref().map(str::trim).unwrap_or("").is_empty() {
                errors.push(format!("missing '{}'", name));
            }
        }
        if let Some(ref impact) = self.impact {
            if !impact.trim().is_empty() && Impact::parse(impact).is_none() {
                errors.push(format!(
                    "invalid impact '{}' (expected non_blocking, partial or blocks_acceptance)",
                    impact
                ));
            }
        }
        if let Some(ref expiry) = self.expiry {
            if parse_expiry(expiry).is_none() {
                errors.push(format!("unparseable expiry '{}'", expiry));
            }
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.schema_errors().is_empty()
    }

    pub fn impact(&self) -> Option<Impact> {
        self.impact.as_deref().and_then(Impact::parse)
    }

    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("<unnamed>")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .as_deref()
            .and_then(parse_expiry)
            .is_some_and(|at| at <= now)
    }
}

/// Accept RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_expiry(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(s) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

// ============================================================================
// Inline Declarations
// ============================================================================

/// One `@placeholder` comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDeclaration {
    /// 1-based line of the marker.
    pub line: u32,
    /// The parsed declaration, or why it could not be parsed.
    pub parsed: std::result::Result<Placeholder, String>,
}

impl InlineDeclaration {
    /// The declaration, if it parsed and passes the schema.
    pub fn valid(&self) -> Option<&Placeholder> {
        self.parsed.as_ref().ok().filter(|p| p.is_valid())
    }
}

/// Find `@placeholder {json}` declarations in the comments of a source file.
pub fn parse_inline_declarations(path: &Path, content: &str) -> Vec<InlineDeclaration> {
    let mut scanner = CommentScanner::new(LanguageProfile::for_path(path).comment);
    let mut out = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let comment = scanner.split(raw).comment;
        let Some(pos) = comment.find(INLINE_MARKER) else {
            continue;
        };
        let body = comment[pos + INLINE_MARKER.len()..]
            .trim()
            .trim_end_matches("*/")
            .trim_end_matches("-->")
            .trim();

        let parsed = if body.is_empty() {
            Err("declaration has no JSON body".to_string())
        } else {
            serde_json::from_str::<Placeholder>(body).map_err(|e| e.to_string())
        };
        out.push(InlineDeclaration {
            line: (idx + 1) as u32,
            parsed,
        });
    }
    out
}

/// Which lines of a file are governed by inline declarations.
#[derive(Debug, Clone, Default)]
pub struct Coverage {
    declaration_lines: HashSet<u32>,
    /// Inclusive ranges covered by valid declarations.
    ranges: Vec<(u32, u32)>,
}

impl Coverage {
    pub fn new(declarations: &[InlineDeclaration], window: usize) -> Self {
        let window = window as u32;
        Self {
            declaration_lines: declarations.iter().map(|d| d.line).collect(),
            ranges: declarations
                .iter()
                .filter(|d| d.valid().is_some())
                .map(|d| (d.line, d.line.saturating_add(window)))
                .collect(),
        }
    }

    /// The line carries a declaration marker (valid or not).
    pub fn is_declaration(&self, line: u32) -> bool {
        self.declaration_lines.contains(&line)
    }

    /// The line is governed by a well-formed declaration above it.
    pub fn covers(&self, line: u32) -> bool {
        self.ranges.iter().any(|&(start, end)| line > start && line <= end)
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Detector for the placeholder-governance gate.
pub struct PlaceholderDetector {
    config: PlaceholderConfig,
    now: Option<DateTime<Utc>>,
}

impl PlaceholderDetector {
    pub fn new(config: PlaceholderConfig) -> Self {
        Self { config, now: None }
    }

    /// Evaluate expiries against a fixed instant.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn finding(&self, rule: &str, message: String, file: &str) -> Finding {
        Finding::new(GateName::Placeholder, rule, message, file)
            .with_severity(FindingSeverity::Error)
    }

    /// Checks shared by artifacts and inline declarations.
    fn check_declarations<'a>(
        &self,
        file: &str,
        declared: impl Iterator<Item = (Option<u32>, &'a Placeholder)>,
        now: DateTime<Utc>,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut count = 0usize;
        let mut debt = 0u32;

        for (line, placeholder) in declared {
            count += 1;
            let with_line = |f: Finding| match line {
                Some(l) => f.with_line(l),
                None => f,
            };

            let errors = placeholder.schema_errors();
            if !errors.is_empty() {
                findings.push(with_line(self.finding(
                    RULE_SCHEMA,
                    format!(
                        "Placeholder {} is malformed: {}",
                        placeholder.label(),
                        errors.join(", ")
                    ),
                    file,
                )));
            }

            if let Some(impact) = placeholder.impact() {
                debt += impact.weight(&self.config);
            }

            if let Some(ref scope) = placeholder.scope {
                if let Some(critical) = self.non_degradable(scope) {
                    findings.push(with_line(
                        self.finding(
                            RULE_NON_DEGRADABLE,
                            format!(
                                "Placeholder {} degrades '{}', which is in the non-degradable scope '{}'",
                                placeholder.label(),
                                scope,
                                critical
                            ),
                            file,
                        )
                        .with_suggestion("Implement this scope fully; it cannot ship degraded"),
                    ));
                }
            }

            if placeholder.is_expired(now) {
                findings.push(with_line(self.finding(
                    RULE_EXPIRED,
                    format!(
                        "Placeholder {} expired on {}",
                        placeholder.label(),
                        placeholder.expiry.as_deref().unwrap_or_default()
                    ),
                    file,
                )));
            }
        }

        if count > self.config.max_placeholders || debt > self.config.max_debt_score {
            findings.push(self.finding(
                RULE_DEBT,
                format!(
                    "{} placeholders with debt score {} exceed the budget ({} placeholders, debt {})",
                    count, debt, self.config.max_placeholders, self.config.max_debt_score
                ),
                file,
            ));
        }

        findings
    }

    fn non_degradable<'s>(&'s self, scope: &str) -> Option<&'s str> {
        let scope = scope.trim().to_lowercase();
        self.config
            .non_degradable_scopes
            .iter()
            .find(|critical| {
                let critical = critical.to_lowercase();
                scope == critical
                    || scope
                        .strip_prefix(critical.as_str())
                        .is_some_and(|rest| rest.starts_with(['.', '/', ':', '-', '_']))
            })
            .map(String::as_str)
    }

    fn check_artifact(
        &self,
        source: &SourceFile,
        promise: &Regex,
        now: DateTime<Utc>,
    ) -> Vec<Finding> {
        let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(&source.content) else {
            return Vec::new();
        };
        let status = doc.get("status").and_then(Value::as_str);
        let raw_placeholders = doc.get("placeholders");
        if raw_placeholders.is_none() && status != Some(DEGRADED_STATUS) {
            return Vec::new();
        }

        let file = source.display.as_str();
        let mut findings = Vec::new();

        let entries: Vec<&Value> = match raw_placeholders {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => {
                findings.push(self.finding(
                    RULE_SCHEMA,
                    "'placeholders' must be an array".to_string(),
                    file,
                ));
                Vec::new()
            }
            None => Vec::new(),
        };

        let mut placeholders: Vec<Placeholder> = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            match serde_json::from_value::<Placeholder>((*entry).clone()) {
                Ok(p) => placeholders.push(p),
                Err(e) => findings.push(self.finding(
                    RULE_SCHEMA,
                    format!("Placeholder entry {} is malformed: {}", idx + 1, e),
                    file,
                )),
            }
        }

        match (status == Some(DEGRADED_STATUS), entries.is_empty()) {
            (true, true) => findings.push(self.finding(
                RULE_REGISTRY,
                "Artifact status is 'degraded' but declares no placeholders".to_string(),
                file,
            )),
            (false, false) => findings.push(self.finding(
                RULE_REGISTRY,
                format!(
                    "Artifact declares {} placeholder(s) but its status is '{}', not '{}'",
                    entries.len(),
                    status.unwrap_or("<missing>"),
                    DEGRADED_STATUS
                ),
                file,
            )),
            _ => {}
        }

        findings.extend(self.check_declarations(
            file,
            placeholders.iter().map(|p| (None, p)),
            now,
        ));

        let governed: HashSet<String> = placeholders
            .iter()
            .filter(|p| p.is_valid())
            .filter_map(|p| p.scope.clone())
            .map(|s| s.to_lowercase())
            .collect();
        let mut promises = Vec::new();
        for (key, value) in doc.iter().filter(|(k, _)| k.as_str() != "placeholders") {
            collect_promises(key, value, &mut vec![key.to_lowercase()], promise, &mut promises);
        }
        for (path, text) in promises {
            let covered = path.iter().any(|segment| governed.contains(segment))
                || governed.iter().any(|scope| text.to_lowercase().contains(scope.as_str()));
            if !covered {
                findings.push(
                    self.finding(
                        RULE_DANGLING,
                        format!(
                            "'{}' promises future work without a declared placeholder: \"{}\"",
                            path.join("."),
                            truncate(&text, 80)
                        ),
                        file,
                    )
                    .with_suggestion("Declare a placeholder for this scope or complete the work"),
                );
            }
        }

        findings
    }

    fn check_source(&self, source: &SourceFile, promise: &Regex, now: DateTime<Utc>) -> Vec<Finding> {
        let declarations = parse_inline_declarations(&source.path, &source.content);
        let coverage = Coverage::new(&declarations, self.config.coverage_window);
        let file = source.display.as_str();
        let mut findings = Vec::new();

        for decl in &declarations {
            if let Err(ref e) = decl.parsed {
                findings.push(
                    self.finding(
                        RULE_SCHEMA,
                        format!("Inline placeholder declaration is not valid JSON: {}", e),
                        file,
                    )
                    .with_line(decl.line),
                );
            }
        }
        findings.extend(self.check_declarations(
            file,
            declarations
                .iter()
                .filter_map(|d| d.parsed.as_ref().ok().map(|p| (Some(d.line), p))),
            now,
        ));

        let mut scanner = CommentScanner::new(LanguageProfile::for_path(&source.path).comment);
        for (idx, raw) in source.content.lines().enumerate() {
            let line = (idx + 1) as u32;
            let comment = scanner.split(raw).comment;
            if coverage.is_declaration(line) || coverage.covers(line) {
                continue;
            }
            if let Some(m) = promise.find(&comment) {
                findings.push(
                    self.finding(
                        RULE_DANGLING,
                        format!(
                            "'{}' promises future work without a covering placeholder declaration",
                            m.as_str().trim()
                        ),
                        file,
                    )
                    .with_line(line)
                    .with_suggestion(format!(
                        "Add `{} {{\"id\": ..., \"scope\": ..., \"reason\": ..., \"impact\": ..., \"fallback\": ...}}` above it, or finish the work",
                        INLINE_MARKER
                    )),
                );
            }
        }

        findings
    }
}

fn collect_promises(
    key: &str,
    value: &Value,
    path: &mut Vec<String>,
    promise: &Regex,
    out: &mut Vec<(Vec<String>, String)>,
) {
    match value {
        Value::String(text) => {
            if promise.is_match(text) {
                out.push((path.clone(), text.clone()));
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_promises(key, item, path, promise, out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                path.push(k.to_lowercase());
                collect_promises(k, v, path, promise, out);
                path.pop();
            }
        }
        _ => {}
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[async_trait]
impl Detector for PlaceholderDetector {
    fn gate(&self) -> GateName {
        GateName::Placeholder
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let promise = Regex::new(PROMISE_PATTERN)?;
        let now = self.now.unwrap_or_else(Utc::now);

        let sources = SourceLoader::default()
            .load(GateName::Placeholder, files, |p| {
                is_json(p) || !is_prose_or_data(p)
            })
            .await;

        let mut findings = Vec::new();
        for source in &sources {
            if is_json(&source.path) {
                findings.extend(self.check_artifact(source, &promise, now));
            } else {
                findings.extend(self.check_source(source, &promise, now));
            }
            tokio::task::yield_now().await;
        }

        Ok(ScanResult::new(findings))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestProject;

    const VALID: &str = r#"{"id":"auth-sso","scope":"auth","reason":"SSO provider pending","impact":"partial","fallback":"password login"}"#;

    async fn scan(project: &TestProject) -> Vec<Finding> {
        PlaceholderDetector::new(PlaceholderConfig::default())
            .scan(&project.file_set())
            .await
            .unwrap()
            .findings
    }

    fn rules(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule.as_str()).collect()
    }

    #[test]
    fn test_schema_errors_list_missing_fields() {
        let p: Placeholder = serde_json::from_str(r#"{"id":"x","impact":"severe"}"#).unwrap();
        let errors = p.schema_errors();
        assert!(errors.iter().any(|e| e.contains("'scope'")));
        assert!(errors.iter().any(|e| e.contains("'fallback'")));
        assert!(errors.iter().any(|e| e.contains("invalid impact 'severe'")));

        let ok: Placeholder = serde_json::from_str(VALID).unwrap();
        assert!(ok.is_valid());
        assert_eq!(ok.impact(), Some(Impact::Partial));
    }

    #[test]
    fn test_parse_expiry_formats() {
        assert!(parse_expiry("2030-01-01").is_some());
        assert!(parse_expiry("2030-01-01T12:00:00Z").is_some());
        assert!(parse_expiry("next tuesday").is_none());
    }

    #[test]
    fn test_inline_declaration_coverage() {
        let content = format!(
            "fn login() {{\n    // @placeholder {}\n    // TODO: implement auth\n}}\n",
            VALID
        );
        let decls = parse_inline_declarations(Path::new("src/login.rs"), &content);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].line, 2);
        assert!(decls[0].valid().is_some());

        let coverage = Coverage::new(&decls, 10);
        assert!(coverage.is_declaration(2));
        assert!(coverage.covers(3));
        assert!(coverage.covers(12));
        assert!(!coverage.covers(13));
        assert!(!coverage.covers(1));
    }

    #[tokio::test]
    async fn test_dangling_promise_without_declaration() {
        let project = TestProject::new().with_file(
            "src/login.rs",
            "fn login() {\n    // TODO: implement auth\n}\n",
        );
        let findings = scan(&project).await;
        assert_eq!(rules(&findings), vec![RULE_DANGLING]);
        assert_eq!(findings[0].line, Some(2));
    }

    #[tokio::test]
    async fn test_declared_promise_is_governed() {
        let project = TestProject::new().with_file(
            "src/login.rs",
            &format!(
                "fn login() {{\n    // @placeholder {}\n    // TODO: implement auth\n}}\n",
                VALID
            ),
        );
        let findings = scan(&project).await;
        assert!(findings.is_empty(), "{:?}", findings);
    }

    #[tokio::test]
    async fn test_malformed_inline_declaration_does_not_cover() {
        let project = TestProject::new().with_file(
            "src/login.rs",
            "// @placeholder {\"id\":\"x\"}\n// TODO: implement auth\n// @placeholder {oops\n",
        );
        let findings = scan(&project).await;
        assert_eq!(
            rules(&findings),
            vec![RULE_SCHEMA, RULE_SCHEMA, RULE_DANGLING]
        );
    }

    #[tokio::test]
    async fn test_wrongly_typed_artifact_entry_reports_type_error() {
        let project = TestProject::new().with_file(
            "out/report.json",
            r#"{"status":"degraded","placeholders":[{"id":"auth-sso","scope":["auth"],"reason":"SSO pending","impact":"partial","fallback":"password"}]}"#,
        );
        let findings = scan(&project).await;
        assert_eq!(rules(&findings), vec![RULE_SCHEMA]);
        assert!(findings[0].message.contains("entry 1"));
        assert!(findings[0].message.contains("invalid type"), "{}", findings[0].message);
        assert!(!findings[0].message.contains("missing"));
    }

    #[tokio::test]
    async fn test_artifact_registry_mismatch_both_ways() {
        let project = TestProject::new()
            .with_file("out/a.json", r#"{"status":"degraded","placeholders":[]}"#)
            .with_file(
                "out/b.json",
                &format!(r#"{{"status":"complete","placeholders":[{}]}}"#, VALID),
            )
            .with_file("out/c.json", &format!(r#"{{"status":"degraded","placeholders":[{}]}}"#, VALID))
            .with_file("package.json", r#"{"name":"app","description":"TODO later"}"#);

        let findings = scan(&project).await;
        let registry: Vec<&str> = findings
            .iter()
            .filter(|f| f.rule == RULE_REGISTRY)
            .map(|f| f.file.as_str())
            .collect();
        assert_eq!(registry, vec!["out/a.json", "out/b.json"]);
        assert!(!findings.iter().any(|f| f.file == "out/c.json"));
        assert!(!findings.iter().any(|f| f.file == "package.json"));
    }

    #[tokio::test]
    async fn test_debt_budget_and_non_degradable_scope() {
        let item = |id: &str, scope: &str, impact: &str| {
            format!(
                r#"{{"id":"{}","scope":"{}","reason":"r","impact":"{}","fallback":"f"}}"#,
                id, scope, impact
            )
        };
        let items = [
            item("a", "ui", "blocks_acceptance"),
            item("b", "ui", "blocks_acceptance"),
            item("c", "security.tokens", "non_blocking"),
        ]
        .join(",");
        let project = TestProject::new().with_file(
            "out/plan.json",
            &format!(r#"{{"status":"degraded","placeholders":[{}]}}"#, items),
        );

        let findings = scan(&project).await;
        let found = rules(&findings);
        assert!(found.contains(&RULE_NON_DEGRADABLE));
        assert!(found.contains(&RULE_DEBT));
        let debt = findings.iter().find(|f| f.rule == RULE_DEBT).unwrap();
        assert!(debt.message.contains("debt score 11"));
    }

    #[tokio::test]
    async fn test_artifact_dangling_promise_matched_by_scope() {
        let project = TestProject::new().with_file(
            "out/report.json",
            &format!(
                r#"{{"status":"degraded","placeholders":[{}],"auth":{{"notes":"SSO coming soon"}},"billing":"invoices coming soon"}}"#,
                VALID
            ),
        );
        let findings = scan(&project).await;
        assert_eq!(rules(&findings), vec![RULE_DANGLING]);
        assert!(findings[0].message.contains("'billing'"));
    }

    #[tokio::test]
    async fn test_expired_placeholder() {
        let expired = r#"{"id":"old","scope":"ui","reason":"r","impact":"partial","fallback":"f","expiry":"2020-01-01"}"#;
        let project = TestProject::new().with_file(
            "out/plan.json",
            &format!(r#"{{"status":"degraded","placeholders":[{}]}}"#, expired),
        );
        let findings = scan(&project).await;
        assert_eq!(rules(&findings), vec![RULE_EXPIRED]);
    }

    #[tokio::test]
    async fn test_prose_is_not_scanned() {
        let project = TestProject::new().with_file("README.md", "Dark mode coming soon.\n");
        assert!(scan(&project).await.is_empty());
    }
}
