//! Documentation-quality gate.
//!
//! Scans prose documents (by extension) for:
//!
//! - `MARKETING_LANGUAGE`: superiority and hype wording
//! - `UNFOUNDED_CLAIM`: completion or quality claims with no link or
//!   reference on the same line
//! - `MISPLACED_STATUS_DOC`: temporal/status documents (progress reports,
//!   session notes, dated files) living outside the archive directory
//! - `DECORATIVE_SYMBOL`: emoji and pictographs
//!
//! Fenced code blocks are skipped.

use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

use super::{Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::DocumentationConfig;
use crate::scope::FileSet;

pub const RULE_MARKETING: &str = "MARKETING_LANGUAGE";
pub const RULE_CLAIM: &str = "UNFOUNDED_CLAIM";
pub const RULE_STATUS_DOC: &str = "MISPLACED_STATUS_DOC";
pub const RULE_DECORATIVE: &str = "DECORATIVE_SYMBOL";

const MARKETING_PATTERN: &str = r"(?i)\b(revolutionary|game[- ]chang(ing|er)|cutting[- ]edge|world[- ]class|best[- ]in[- ]class|blazing(ly)?[- ]fast|lightning[- ]fast|seamless(ly)?|enterprise[- ]grade|next[- ]gen(eration)?|state[- ]of[- ]the[- ]art|unparalleled|industry[- ]leading|groundbreaking|amazing|incredible|magical|bulletproof|effortless(ly)?|unmatched|supercharge[ds]?)\b";

const CLAIM_PATTERN: &str = r"(?i)\b100\s*%\s*(complete|done|tested|coverage|working|reliable)|\bfully\s+(implemented|complete|tested|functional|production[- ]ready)\b|\bproduction[- ]ready\b|\b(all|every)\s+tests?\s+pass(es|ing)?\b|\bzero\s+bugs\b|\bbug[- ]free\b|\b(feature|implementation)\s+complete\b";

/// Evidence that turns a claim into a referenced one.
const EVIDENCE_PATTERN: &str = r"https?://|\]\(|#\d+|\bsee\s+`";

/// Name tokens that mark a temporal or status document.
const STATUS_TOKENS: &[&str] = &[
    "status",
    "progress",
    "completion",
    "complete",
    "completed",
    "done",
    "wip",
    "handoff",
    "session",
    "sprint",
    "phase",
    "retro",
    "standup",
];

/// Name fragments that mark a temporal or status document.
const STATUS_FRAGMENTS: &[&str] = &["implementation_summary", "final_report", "work_log"];

const DATE_PATTERN: &str = r"(^|[^0-9])(20\d{2}-?\d{2}-?\d{2})([^0-9]|$)";

/// Emoji and pictograph ranges.
pub fn is_decorative(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF   // pictographs, emoticons, transport, supplemental symbols
        | 0x2600..=0x27BF   // misc symbols and dingbats
        | 0x2B50..=0x2B55   // stars and circles
        | 0x1F000..=0x1F02F // mahjong, domino
        | 0x1F100..=0x1F1FF // enclosed alphanumerics, flags
    )
}

/// Detector for the documentation-quality gate.
pub struct DocumentationDetector {
    config: DocumentationConfig,
}

struct Patterns {
    marketing: Regex,
    claim: Regex,
    evidence: Regex,
    date: Regex,
}

impl Patterns {
    fn compile() -> anyhow::Result<Self> {
        Ok(Self {
            marketing: Regex::new(MARKETING_PATTERN)?,
            claim: Regex::new(CLAIM_PATTERN)?,
            evidence: Regex::new(EVIDENCE_PATTERN)?,
            date: Regex::new(DATE_PATTERN)?,
        })
    }
}

impl DocumentationDetector {
    pub fn new(config: DocumentationConfig) -> Self {
        Self { config }
    }

    fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(e))
            })
    }

    fn in_archive(&self, display: &str) -> bool {
        let archive = self.config.archive_dir.trim_matches('/');
        !archive.is_empty()
            && display
                .strip_prefix(archive)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    fn is_status_doc(&self, path: &Path, patterns: &Patterns) -> bool {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return false;
        };
        let lower = stem.to_lowercase();
        lower
            .split(['_', '-', '.', ' '])
            .any(|token| STATUS_TOKENS.contains(&token))
            || STATUS_FRAGMENTS
                .iter()
                .any(|f| lower.replace('-', "_").contains(f))
            || patterns.date.is_match(&lower)
    }

    fn finding(&self, rule: &str, message: String, file: &str, line: Option<u32>) -> Finding {
        let finding = Finding::new(GateName::Documentation, rule, message, file)
            .with_severity(FindingSeverity::Error);
        match line {
            Some(l) => finding.with_line(l),
            None => finding,
        }
    }

    fn check(&self, source: &SourceFile, patterns: &Patterns) -> Vec<Finding> {
        let file = source.display.as_str();
        let mut findings = Vec::new();

        if self.is_status_doc(&source.path, patterns) && !self.in_archive(file) {
            findings.push(
                self.finding(
                    RULE_STATUS_DOC,
                    "Temporal/status document outside the archive".to_string(),
                    file,
                    None,
                )
                .with_suggestion(format!(
                    "Move it under {}/ or fold the durable parts into permanent docs",
                    self.config.archive_dir.trim_end_matches('/')
                )),
            );
        }

        let mut in_fence = false;
        for (idx, text) in source.content.lines().enumerate() {
            let line = Some((idx + 1) as u32);
            let trimmed = text.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            if let Some(m) = patterns.marketing.find(text) {
                findings.push(
                    self.finding(
                        RULE_MARKETING,
                        format!("Marketing language: \"{}\"", m.as_str()),
                        file,
                        line,
                    )
                    .with_suggestion("State what it does and measured results instead"),
                );
            }

            if let Some(m) = patterns.claim.find(text) {
                if !patterns.evidence.is_match(text) {
                    findings.push(
                        self.finding(
                            RULE_CLAIM,
                            format!("Unfounded claim: \"{}\"", m.as_str()),
                            file,
                            line,
                        )
                        .with_suggestion("Link the evidence (CI run, coverage report, issue) or drop the claim"),
                    );
                }
            }

            let symbols: Vec<char> = text.chars().filter(|c| is_decorative(*c)).collect();
            if let Some(first) = symbols.first() {
                findings.push(self.finding(
                    RULE_DECORATIVE,
                    format!(
                        "Decorative symbol '{}'{}",
                        first,
                        if symbols.len() > 1 {
                            format!(" and {} more", symbols.len() - 1)
                        } else {
                            String::new()
                        }
                    ),
                    file,
                    line,
                ));
            }
        }

        findings
    }
}

#[async_trait]
impl Detector for DocumentationDetector {
    fn gate(&self) -> GateName {
        GateName::Documentation
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let patterns = Patterns::compile()?;
        let sources = SourceLoader::default()
            .load(GateName::Documentation, files, |p| self.is_document(p))
            .await;

        let mut findings = Vec::new();
        for source in &sources {
            findings.extend(self.check(source, &patterns));
            tokio::task::yield_now().await;
        }
        Ok(ScanResult::new(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestProject;

    fn check(path: &str, content: &str) -> Vec<Finding> {
        let detector = DocumentationDetector::new(DocumentationConfig::default());
        detector.check(&SourceFile::new(path, content), &Patterns::compile().unwrap())
    }

    fn rules(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule.as_str()).collect()
    }

    #[test]
    fn test_marketing_and_claims() {
        let findings = check(
            "README.md",
            "# Tool\n\nA revolutionary parser.\nThe importer is production-ready.\nCoverage is 100% complete, see [CI](https://ci.example/run/1).\n",
        );
        assert_eq!(rules(&findings), vec![RULE_MARKETING, RULE_CLAIM]);
        assert_eq!(findings[0].line, Some(3));
        assert_eq!(findings[1].line, Some(4));
    }

    #[test]
    fn test_decorative_symbols() {
        let findings = check("docs/guide.md", "## Setup \u{2705}\u{2728}\nPlain line\n");
        assert_eq!(rules(&findings), vec![RULE_DECORATIVE]);
        assert!(findings[0].message.contains("and 1 more"));
        assert!(!is_decorative('é'));
        assert!(!is_decorative('→'));
    }

    #[test]
    fn test_fenced_code_is_skipped() {
        let findings = check("README.md", "```\nlet amazing = \"\u{1F680}\";\n```\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_status_docs_belong_in_archive() {
        assert_eq!(rules(&check("PHASE_2_COMPLETE.md", "Done.\n")), vec![RULE_STATUS_DOC]);
        assert_eq!(rules(&check("notes/2024-05-01-standup.md", "ok\n")), vec![RULE_STATUS_DOC]);
        assert_eq!(rules(&check("IMPLEMENTATION_SUMMARY.md", "ok\n")), vec![RULE_STATUS_DOC]);
        assert!(check("docs/archive/PHASE_2_COMPLETE.md", "Done.\n").is_empty());
        assert!(check("docs/archive-old/STATUS.md", "x\n")
            .iter()
            .any(|f| f.rule == RULE_STATUS_DOC));
        assert!(check("CHANGELOG.md", "x\n").is_empty());
        assert!(check("docs/architecture.md", "x\n").is_empty());
    }

    #[tokio::test]
    async fn test_scan_only_reads_documents() {
        let project = TestProject::new()
            .with_file("src/lib.rs", "// amazing \u{1F680}\n")
            .with_file("README.md", "An amazing tool\n");
        let result = DocumentationDetector::new(DocumentationConfig::default())
            .scan(&project.file_set())
            .await
            .unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].file, "README.md");
    }
}
