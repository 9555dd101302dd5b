//! Confidence scoring.
//!
//! A group's confidence is the sum of its signals' weights, clamped to
//! `[-1, 1]`. Each rule counts once per group however many lines it matched.
//! File-level context (tests, examples, docs, generated code) and line-level
//! context (doc comments, adjacent code) add their own signed signals.

use std::collections::BTreeMap;
use std::path::{Component, Path};

pub const MIN_CONFIDENCE: f64 = -1.0;
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Findings below this confidence are reported as advisory.
pub const ADVISORY_BELOW: f64 = 0.5;

pub const TEST_PENALTY: f64 = -0.2;
pub const EXAMPLE_PENALTY: f64 = -0.4;
pub const DOCUMENTATION_PENALTY: f64 = -0.4;
pub const GENERATED_PENALTY: f64 = -0.6;
pub const DOC_COMMENT_PENALTY: f64 = -0.2;
pub const ADJACENT_CODE_BOOST: f64 = 0.1;

/// Lines inspected for generated-code banners.
const BANNER_LINES: usize = 5;

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "testdata"];
const EXAMPLE_DIRS: &[&str] = &["example", "examples", "demo", "demos", "sample", "samples"];
const DOC_DIRS: &[&str] = &["doc", "docs", "documentation"];
const GENERATED_DIRS: &[&str] = &["generated", "gen", "__generated__"];
const GENERATED_BANNERS: &[&str] = &["@generated", "do not edit", "auto-generated", "autogenerated"];

/// Signed signals collected for one group of lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    signals: BTreeMap<&'static str, f64>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a signal; repeats of the same id are ignored.
    pub fn add(&mut self, id: &'static str, weight: f64) {
        self.signals.entry(id).or_insert(weight);
    }

    pub fn has(&self, id: &str) -> bool {
        self.signals.contains_key(id)
    }

    /// Clamped sum of all signals.
    pub fn confidence(&self) -> f64 {
        self.signals
            .values()
            .sum::<f64>()
            .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }

    pub fn signals(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.signals.iter().map(|(id, w)| (*id, *w))
    }
}

/// What kind of file a finding sits in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileContext {
    pub test: bool,
    pub example: bool,
    pub documentation: bool,
    pub generated: bool,
}

impl FileContext {
    pub fn classify(path: &Path, content: &str) -> Self {
        let dirs: Vec<String> = path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str().map(str::to_lowercase),
                _ => None,
            })
            .collect();
        let in_dir = |names: &[&str]| dirs.iter().any(|d| names.contains(&d.as_str()));

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let stem = name.split('.').next().unwrap_or_default();

        let test_name = stem.starts_with("test_")
            || stem.ends_with("_test")
            || stem.ends_with("_spec")
            || name.contains(".test.")
            || name.contains(".spec.");
        let generated_name =
            name.contains(".generated.") || name.contains(".pb.") || stem.ends_with("_pb2");
        let banner = content.lines().take(BANNER_LINES).any(|line| {
            let line = line.to_lowercase();
            GENERATED_BANNERS.iter().any(|b| line.contains(b))
        });

        Self {
            test: test_name || in_dir(TEST_DIRS),
            example: in_dir(EXAMPLE_DIRS),
            documentation: in_dir(DOC_DIRS),
            generated: generated_name || banner || in_dir(GENERATED_DIRS),
        }
    }

    /// Add this file's context signals to a score.
    pub fn apply(&self, score: &mut Score) {
        if self.test {
            score.add("context_test_file", TEST_PENALTY);
        }
        if self.example {
            score.add("context_example_file", EXAMPLE_PENALTY);
        }
        if self.documentation {
            score.add("context_documentation_file", DOCUMENTATION_PENALTY);
        }
        if self.generated {
            score.add("context_generated_file", GENERATED_PENALTY);
        }
    }
}

/// Whether comment text (after its marker) is a doc comment: `///`, `//!`, `/**`.
pub fn is_doc_comment(comment: &str) -> bool {
    comment.starts_with('/') || comment.starts_with('!') || comment.starts_with('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamps_and_dedupes() {
        let mut score = Score::new();
        score.add("a", 0.7);
        score.add("a", 0.7);
        assert!((score.confidence() - 0.7).abs() < 1e-9);
        score.add("b", 0.6);
        assert_eq!(score.confidence(), MAX_CONFIDENCE);
        score.add("c", -3.0);
        assert_eq!(score.confidence(), MIN_CONFIDENCE);
    }

    #[test]
    fn test_file_context_classification() {
        let ctx = FileContext::classify(Path::new("src/auth/login.rs"), "");
        assert_eq!(ctx, FileContext::default());

        assert!(FileContext::classify(Path::new("tests/login.rs"), "").test);
        assert!(FileContext::classify(Path::new("src/login_test.go"), "").test);
        assert!(FileContext::classify(Path::new("web/login.spec.ts"), "").test);
        assert!(FileContext::classify(Path::new("examples/demo.rs"), "").example);
        assert!(FileContext::classify(Path::new("docs/snippets/a.py"), "").documentation);
        assert!(FileContext::classify(Path::new("api/user_pb2.py"), "").generated);
        assert!(
            FileContext::classify(Path::new("src/schema.rs"), "// @generated by build.rs\n")
                .generated
        );
    }

    #[test]
    fn test_file_name_is_not_a_directory() {
        assert!(!FileContext::classify(Path::new("src/examples.rs"), "").example);
    }

    #[test]
    fn test_doc_comment_detection() {
        assert!(is_doc_comment("/ Returns the total."));
        assert!(is_doc_comment("! Crate docs"));
        assert!(!is_doc_comment(" TODO: fix"));
    }
}
