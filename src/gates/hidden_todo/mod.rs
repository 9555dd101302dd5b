//! Hidden-TODO gate.
//!
//! Finds incomplete work that slipped through review, in two passes over every
//! source line:
//!
//! - **Broad keywords** in comments (TODO, stub, placeholder, disabled,
//!   "for now"). When [`BROAD_KEYWORD_BYPASSES_CONFIDENCE`] is in effect these
//!   are kept regardless of confidence.
//! - **Scored rules**: disguised phrases ("in a real system...") and stub
//!   signatures from the file's [`LanguageProfile`], weighed together with
//!   context signals into a confidence in `[-1, 1]`. Only groups at or above
//!   the configured threshold are kept.
//!
//! Adjacent matching lines form one finding. Prose and data files are not
//! scanned, and lines governed by an inline `@placeholder` declaration are
//! declared work, not hidden work.
//!
//! # Module Structure
//!
//! - [`rules`] - rule tables and their compiled form
//! - [`scoring`] - confidence arithmetic and file context
//! - [`template`] - structured TODO suggestions

pub mod rules;
pub mod scoring;
pub mod template;

pub use rules::{RuleCategory, RuleSet};
pub use scoring::{FileContext, Score};
pub use template::TemplateAdvisor;

use async_trait::async_trait;
use tracing::debug;

use super::placeholder::{parse_inline_declarations, Coverage};
use super::source::is_prose_or_data;
use super::{Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::{HiddenTodoConfig, PlaceholderConfig};
use crate::language::{CommentScanner, LanguageProfile, LineParts};
use crate::scope::FileSet;
use rules::CompiledRule;
use scoring::{is_doc_comment, ADJACENT_CODE_BOOST, ADVISORY_BELOW, DOC_COMMENT_PENALTY};

/// Broad-keyword hits skip confidence gating unless configured otherwise.
pub const BROAD_KEYWORD_BYPASSES_CONFIDENCE: bool = true;

const SNIPPET_CHARS: usize = 80;

/// One line that matched at least one finding-producing rule.
struct LineHit<'r> {
    line: u32,
    matched: Vec<&'r CompiledRule>,
    comment: String,
    code: String,
    doc_comment: bool,
}

impl LineHit<'_> {
    fn has(&self, category: RuleCategory) -> bool {
        self.matched.iter().any(|r| r.category == category)
    }

    fn top_category(&self) -> Option<RuleCategory> {
        self.matched
            .iter()
            .map(|r| r.category)
            .filter(RuleCategory::is_signal)
            .min()
    }
}

/// Detector for the hidden-TODO gate.
pub struct HiddenTodoDetector {
    config: HiddenTodoConfig,
    coverage_window: usize,
}

impl HiddenTodoDetector {
    pub fn new(config: HiddenTodoConfig) -> Self {
        Self {
            config,
            coverage_window: PlaceholderConfig::default().coverage_window,
        }
    }

    /// Lines after an inline placeholder declaration that it governs.
    #[must_use]
    pub fn with_coverage_window(mut self, lines: usize) -> Self {
        self.coverage_window = lines;
        self
    }

    /// Analyze one loaded file.
    pub fn analyze(
        &self,
        rules: &RuleSet,
        advisor: &TemplateAdvisor,
        source: &SourceFile,
    ) -> Vec<Finding> {
        let profile = LanguageProfile::for_path(&source.path);
        let file_context = FileContext::classify(&source.path, &source.content);
        let coverage = Coverage::new(
            &parse_inline_declarations(&source.path, &source.content),
            self.coverage_window,
        );
        let stubs = rules.stub_rules(profile.language);
        let mut scanner = CommentScanner::new(profile.comment);

        let lines: Vec<LineParts> = source.content.lines().map(|l| scanner.split(l)).collect();
        let has_code: Vec<bool> = lines.iter().map(|p| !p.code.trim().is_empty()).collect();
        let mut hits: Vec<LineHit<'_>> = Vec::new();

        for (idx, parts) in lines.iter().enumerate() {
            let line = (idx + 1) as u32;
            let code_present = has_code[idx];

            if coverage.is_declaration(line) || coverage.covers(line) {
                continue;
            }

            let mut matched: Vec<&CompiledRule> = Vec::new();
            if parts.has_comment() {
                matched.extend(
                    rules
                        .text_rules()
                        .iter()
                        .filter(|r| r.applies_to_comment() && r.regex.is_match(&parts.comment)),
                );
            }
            if code_present {
                matched.extend(
                    rules
                        .text_rules()
                        .iter()
                        .filter(|r| r.applies_to_code() && r.regex.is_match(&parts.code)),
                );
                let window = lines
                    .get(idx + 1)
                    .filter(|next| !next.code.trim().is_empty())
                    .map(|next| format!("{}\n{}", parts.code.trim_end(), next.code.trim()));
                matched.extend(stubs.iter().filter(|r| {
                    r.regex.is_match(&parts.code)
                        || window.as_deref().is_some_and(|w| starts_on_first_line(r, w, &parts.code))
                }));
            }

            if matched.iter().any(|r| r.category.is_signal()) {
                hits.push(LineHit {
                    line,
                    matched,
                    doc_comment: !code_present && is_doc_comment(&parts.comment),
                    comment: parts.comment.clone(),
                    code: parts.code.clone(),
                });
            }
        }

        let mut findings = Vec::new();
        let mut start = 0;
        while start < hits.len() {
            let mut end = start + 1;
            while end < hits.len() && hits[end].line == hits[end - 1].line + 1 {
                end += 1;
            }
            if let Some(finding) =
                self.group_finding(&hits[start..end], &has_code, file_context, &profile, advisor, source)
            {
                findings.push(finding);
            }
            start = end;
        }
        findings
    }

    fn group_finding(
        &self,
        group: &[LineHit<'_>],
        has_code: &[bool],
        file_context: FileContext,
        profile: &LanguageProfile,
        advisor: &TemplateAdvisor,
        source: &SourceFile,
    ) -> Option<Finding> {
        let first = group.first()?;
        let last = group.last()?;
        let category = group.iter().filter_map(LineHit::top_category).min()?;
        let rule = category.finding_rule()?;

        let mut score = Score::new();
        for hit in group {
            for r in &hit.matched {
                score.add(r.id, r.weight);
            }
        }
        file_context.apply(&mut score);
        if group.iter().all(|h| h.doc_comment) {
            score.add("context_doc_comment", DOC_COMMENT_PENALTY);
        }
        let from_comment = group.iter().any(|h| {
            h.has(RuleCategory::BroadKeyword) || h.has(RuleCategory::DisguisedPhrase)
        });
        // `has_code` is 0-based, so the line after the group sits at `last.line`.
        let next_is_code = has_code.get(last.line as usize).copied().unwrap_or(false);
        let code_in_group = group.iter().any(|h| !h.code.trim().is_empty());
        if from_comment && (code_in_group || next_is_code) {
            score.add("context_adjacent_code", ADJACENT_CODE_BOOST);
        }

        let confidence = score.confidence();
        let vocabulary = group.iter().any(|h| h.has(RuleCategory::TodoVocabulary));
        let bypass = self.config.broad_keyword_bypass
            && category == RuleCategory::BroadKeyword
            && !vocabulary;

        debug!(
            file = %source.display,
            line = first.line,
            confidence,
            bypass,
            signals = ?score.signals().collect::<Vec<_>>(),
            "Scored hidden-TODO candidate"
        );

        if !bypass && confidence < self.config.confidence_threshold {
            return None;
        }

        let lead = group
            .iter()
            .find(|h| h.top_category() == Some(category))
            .unwrap_or(first);
        let text = if category == RuleCategory::StubSignature {
            lead.code.trim()
        } else {
            lead.comment.trim_start_matches(['/', '!', '*']).trim()
        };
        let mut message = match category {
            RuleCategory::BroadKeyword => format!("Incomplete-work marker: \"{}\"", snippet(text)),
            RuleCategory::DisguisedPhrase => {
                format!("Comment describes unfinished work: \"{}\"", snippet(text))
            }
            _ => format!("Stub implementation: \"{}\"", snippet(text)),
        };
        if group.len() > 1 {
            message.push_str(&format!(" (+{} more lines)", group.len() - 1));
        }

        let marker = profile.comment.line.first().copied().unwrap_or("//");
        let template = (self.config.suggest_templates && category != RuleCategory::StubSignature)
            .then(|| advisor.suggest(&lead.comment, marker))
            .flatten();
        let suggestion = match (template, category) {
            (Some(t), _) => format!("Rewrite as a tracked TODO:\n{}", t),
            (None, RuleCategory::StubSignature) => {
                "Replace the stub with a real implementation".to_string()
            }
            (None, _) => {
                "Finish the work, link it to an issue, or declare it with an @placeholder comment"
                    .to_string()
            }
        };

        let mut finding = Finding::new(GateName::HiddenTodo, rule, message, source.display.clone())
            .with_line(first.line)
            .with_confidence((confidence * 100.0).round() / 100.0)
            .with_suggestion(suggestion);
        if confidence < ADVISORY_BELOW {
            finding = finding.with_severity(FindingSeverity::Warning);
        }
        Some(finding)
    }
}

/// Empty bodies are often split over two lines, so stubs are also matched
/// against a line joined with the next one. Such a match counts only if it
/// begins on the first line; a stub on the next line is reported there.
fn starts_on_first_line(rule: &CompiledRule, window: &str, first: &str) -> bool {
    rule.regex
        .find(window)
        .is_some_and(|m| m.start() < first.trim_end().len())
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(SNIPPET_CHARS).collect::<String>())
    }
}

#[async_trait]
impl Detector for HiddenTodoDetector {
    fn gate(&self) -> GateName {
        GateName::HiddenTodo
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let rules = RuleSet::compile()?;
        let advisor = TemplateAdvisor::new()?;

        let sources = SourceLoader::default()
            .load(GateName::HiddenTodo, files, |p| !is_prose_or_data(p))
            .await;

        let mut findings = Vec::new();
        for source in &sources {
            findings.extend(self.analyze(&rules, &advisor, source));
            tokio::task::yield_now().await;
        }
        Ok(ScanResult::new(findings))
    }
}
