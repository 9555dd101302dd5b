//! Structured TODO templates.
//!
//! An unstructured marker ("TODO: fix") carries no owner, tracker link or exit
//! criteria. In template mode the detector suggests a rewrite that has them.

use regex::Regex;

/// Markers that make a TODO traceable: an owner, an issue reference, a link
/// or a checklist.
const STRUCTURE_PATTERN: &str =
    r"(?i:\b(todo|fixme)\s*\(\s*[\w.@-]+\s*\))|@\w+|#\d+|\b[A-Z][A-Z0-9]+-\d+\b|https?://|- \[[ x]\]";

/// Detects whether a comment already follows the structured form.
#[derive(Debug, Clone)]
pub struct TemplateAdvisor {
    structure: Regex,
}

impl TemplateAdvisor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            structure: Regex::new(STRUCTURE_PATTERN)?,
        })
    }

    pub fn is_structured(&self, comment: &str) -> bool {
        self.structure.is_match(comment)
    }

    /// Template rewrite of `comment`, or `None` when it is already structured.
    pub fn suggest(&self, comment: &str, marker: &str) -> Option<String> {
        if self.is_structured(comment) {
            return None;
        }
        Some(render(marker, &summary_of(comment)))
    }
}

/// The comment text with its keyword prefix removed.
fn summary_of(comment: &str) -> String {
    let trimmed = comment.trim().trim_start_matches(['/', '!', '*']).trim();
    let without_keyword = ["TODO", "FIXME", "XXX", "HACK", "todo", "fixme", "hack"]
        .iter()
        .find_map(|k| trimmed.strip_prefix(k))
        .unwrap_or(trimmed);
    let summary = without_keyword.trim_start_matches([':', '-', ' ']).trim();
    if summary.is_empty() {
        "<what remains to be done>".to_string()
    } else {
        summary.to_string()
    }
}

/// Render the multi-line template with the file's comment marker.
pub fn render(marker: &str, summary: &str) -> String {
    [
        format!("{} TODO(<owner>): {}", marker, summary),
        format!("{}   Issue: <tracker link>", marker),
        format!("{}   Acceptance:", marker),
        format!("{}   - [ ] <observable outcome>", marker),
        format!("{}   Depends on: <issue or none>", marker),
        format!("{}   Remove by: <YYYY-MM-DD>", marker),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_comments_need_no_template() {
        let advisor = TemplateAdvisor::new().unwrap();
        assert!(advisor.is_structured(" TODO(alice): wire retries"));
        assert!(advisor.is_structured(" TODO: wire retries, see #142"));
        assert!(advisor.is_structured(" TODO: wire retries PLAT-88"));
        assert!(!advisor.is_structured(" TODO: wire retries"));
    }

    #[test]
    fn test_suggest_keeps_summary_and_marker() {
        let advisor = TemplateAdvisor::new().unwrap();
        let template = advisor.suggest(" TODO: implement auth", "#").unwrap();
        let first = template.lines().next().unwrap();
        assert_eq!(first, "# TODO(<owner>): implement auth");
        assert!(template.lines().all(|l| l.starts_with('#')));
        assert!(template.contains("- [ ]"));
    }

    #[test]
    fn test_empty_summary_gets_prompt() {
        assert_eq!(summary_of(" FIXME"), "<what remains to be done>");
    }
}
