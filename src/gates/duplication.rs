//! Duplication gate.
//!
//! Two checks over normalized code lines (trimmed, whitespace collapsed,
//! comments and trivial punctuation-only lines dropped):
//!
//! - **Blocks**: every window of `window_lines` consecutive lines is hashed;
//!   windows seen in more than one place are merged into contiguous
//!   duplicated regions, one finding per region.
//! - **Files**: two files of the same kind whose line sets have a Jaccard
//!   similarity at or above `file_similarity` are reported as near-identical.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

use super::{Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::DuplicationConfig;
use crate::language::{CommentScanner, Language, LanguageProfile};
use crate::scope::FileSet;

pub const RULE_BLOCK: &str = "DUPLICATE_BLOCK";
pub const RULE_FILE: &str = "DUPLICATE_FILE";

/// Lines shorter than this after normalization carry no signal (`}`, `);`).
const MIN_SIGNIFICANT_CHARS: usize = 4;

/// Duplicate-window groups resolved between yields to the scheduler.
const GROUPS_PER_YIELD: usize = 256;

/// A file reduced to its significant lines.
#[derive(Debug, Clone)]
struct NormalizedFile {
    display: String,
    extension: String,
    /// (original 1-based line number, normalized text)
    lines: Vec<(u32, String)>,
}

impl NormalizedFile {
    fn from_source(source: &SourceFile) -> Self {
        let mut scanner = CommentScanner::new(LanguageProfile::for_path(&source.path).comment);
        let lines = source
            .content
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let code = scanner.split(raw).code;
                let normalized = normalize_line(&code);
                (normalized.len() >= MIN_SIGNIFICANT_CHARS).then(|| ((idx + 1) as u32, normalized))
            })
            .collect();

        Self {
            display: source.display.clone(),
            extension: source.extension().unwrap_or_default(),
            lines,
        }
    }

    fn original_line(&self, normalized_idx: usize) -> u32 {
        self.lines.get(normalized_idx).map(|(n, _)| *n).unwrap_or(1)
    }
}

/// Trim and collapse internal whitespace.
pub fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of a window of normalized lines.
pub fn window_hash(lines: &[(u32, String)]) -> String {
    let mut hasher = Sha256::new();
    for (_, text) in lines {
        hasher.update(text.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Jaccard similarity of two sets.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Detector for the duplication gate.
pub struct DuplicationDetector {
    config: DuplicationConfig,
}

impl DuplicationDetector {
    pub fn new(config: DuplicationConfig) -> Self {
        Self { config }
    }

    /// Near-identical file pairs as (earlier, later, similarity).
    ///
    /// Yields after each file's row of comparisons so a gate timeout can
    /// interrupt large trees.
    async fn similar_files(&self, files: &[NormalizedFile]) -> Vec<(usize, usize, f64)> {
        let sets: Vec<HashSet<&str>> = files
            .iter()
            .map(|f| f.lines.iter().map(|(_, t)| t.as_str()).collect())
            .collect();
        let threshold = self.config.file_similarity;
        let mut pairs = Vec::new();

        for i in 0..files.len() {
            if files[i].lines.len() < self.config.min_file_lines {
                continue;
            }
            for j in (i + 1)..files.len() {
                if files[j].lines.len() < self.config.min_file_lines
                    || files[i].extension != files[j].extension
                {
                    continue;
                }
                let (small, large) = if sets[i].len() <= sets[j].len() {
                    (sets[i].len(), sets[j].len())
                } else {
                    (sets[j].len(), sets[i].len())
                };
                // Jaccard can never exceed the size ratio.
                if large == 0 || (small as f64 / large as f64) < threshold {
                    continue;
                }
                let similarity = jaccard(&sets[i], &sets[j]);
                if similarity >= threshold {
                    pairs.push((i, j, similarity));
                }
            }
            tokio::task::yield_now().await;
        }
        pairs
    }

    async fn duplicate_blocks(
        &self,
        files: &[NormalizedFile],
        whole_file_pairs: &HashSet<(usize, usize)>,
    ) -> Vec<Finding> {
        let window = self.config.window_lines.max(1);
        let mut index: BTreeMap<String, Vec<(usize, usize)>> = BTreeMap::new();
        for (f, file) in files.iter().enumerate() {
            if file.lines.len() < window {
                continue;
            }
            for start in 0..=(file.lines.len() - window) {
                index
                    .entry(window_hash(&file.lines[start..start + window]))
                    .or_default()
                    .push((f, start));
            }
            tokio::task::yield_now().await;
        }

        // partner[f][start] = first other location of the window at `start`
        let mut partner: Vec<BTreeMap<usize, (usize, usize)>> = vec![BTreeMap::new(); files.len()];
        for (n, occurrences) in index.values().filter(|o| o.len() > 1).enumerate() {
            if n % GROUPS_PER_YIELD == GROUPS_PER_YIELD - 1 {
                tokio::task::yield_now().await;
            }
            for &(f, start) in occurrences {
                let other = occurrences.iter().find(|&&(g, s)| {
                    let overlapping = g == f && s.abs_diff(start) < window;
                    let same_pair = whole_file_pairs.contains(&(f.min(g), f.max(g)));
                    !overlapping && !same_pair
                });
                if let Some(&other) = other {
                    partner[f].entry(start).or_insert(other);
                }
            }
        }

        let mut findings = Vec::new();
        for (f, starts) in partner.iter().enumerate() {
            let file = &files[f];
            let mut iter = starts.iter().peekable();
            while let Some((&region_start, &(pf, ps))) = iter.next() {
                let mut region_end = region_start + window - 1;
                while let Some(&(&next, _)) = iter.peek() {
                    if next <= region_end + 1 {
                        region_end = region_end.max(next + window - 1);
                        iter.next();
                    } else {
                        break;
                    }
                }

                let first = file.original_line(region_start);
                let last = file.original_line(region_end);
                let other = &files[pf];
                findings.push(
                    Finding::new(
                        GateName::Duplication,
                        RULE_BLOCK,
                        format!(
                            "Lines {}-{} duplicate code at {}:{}",
                            first,
                            last,
                            other.display,
                            other.original_line(ps)
                        ),
                        file.display.clone(),
                    )
                    .with_line(first)
                    .with_severity(FindingSeverity::Error)
                    .with_suggestion("Extract the shared logic into a single function or module"),
                );
            }
        }
        findings
    }
}

#[async_trait]
impl Detector for DuplicationDetector {
    fn gate(&self) -> GateName {
        GateName::Duplication
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let sources = SourceLoader::default()
            .load(GateName::Duplication, files, |p| Language::from_path(p).is_some())
            .await;

        let mut normalized = Vec::with_capacity(sources.len());
        for source in &sources {
            normalized.push(NormalizedFile::from_source(source));
            tokio::task::yield_now().await;
        }

        let pairs = self.similar_files(&normalized).await;

        let mut findings: Vec<Finding> = pairs
            .iter()
            .map(|&(i, j, similarity)| {
                Finding::new(
                    GateName::Duplication,
                    RULE_FILE,
                    format!(
                        "File is {:.0}% identical to {}",
                        similarity * 100.0,
                        normalized[i].display
                    ),
                    normalized[j].display.clone(),
                )
                .with_severity(FindingSeverity::Error)
                .with_suggestion("Merge the two files or extract their common part")
            })
            .collect();

        let whole: HashSet<(usize, usize)> = pairs.iter().map(|&(i, j, _)| (i, j)).collect();
        findings.extend(self.duplicate_blocks(&normalized, &whole).await);

        Ok(ScanResult::new(findings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestProject;

    const SHARED: &str = "let total = items.iter().sum();\n\
        let average = total / items.len();\n\
        let spread = max_value - min_value;\n\
        println!(\"total={}\", total);\n\
        println!(\"avg={}\", average);\n\
        println!(\"spread={}\", spread);\n\
        return Report::new(total, average, spread);\n";

    fn detector() -> DuplicationDetector {
        DuplicationDetector::new(DuplicationConfig::default())
    }

    #[test]
    fn test_normalize_and_hash_ignore_whitespace() {
        assert_eq!(normalize_line("   let  x =\t1; "), "let x = 1;");
        let a = vec![(1, "let x = 1;".to_string())];
        let b = vec![(9, "let x = 1;".to_string())];
        assert_eq!(window_hash(&a), window_hash(&b));
        assert_eq!(window_hash(&a).len(), 64);
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        let b: HashSet<&str> = ["b", "c", "d"].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < f64::EPSILON);
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[tokio::test]
    async fn test_duplicated_block_reported_in_both_files() {
        let project = TestProject::new()
            .with_file("src/a.rs", &format!("fn a(items: &[u32]) {{\n{}}}\n", SHARED))
            .with_file(
                "src/b.rs",
                &format!("// header\nuse std::fmt;\n\nfn b(items: &[u32]) {{\n{}}}\n", SHARED),
            );

        let result = detector().scan(&project.file_set()).await.unwrap();
        let blocks: Vec<_> = result.findings.iter().filter(|f| f.rule == RULE_BLOCK).collect();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].file, "src/a.rs");
        assert_eq!(blocks[0].line, Some(2));
        assert!(blocks[0].message.contains("src/b.rs:5"));
        assert_eq!(blocks[1].file, "src/b.rs");
    }

    #[tokio::test]
    async fn test_comment_only_differences_still_duplicate() {
        let commented: String = SHARED
            .lines()
            .map(|l| format!("    {}   // note\n", l))
            .collect();
        let project = TestProject::new()
            .with_file("src/a.rs", SHARED)
            .with_file("src/b.rs", &commented);

        let result = detector().scan(&project.file_set()).await.unwrap();
        assert_eq!(
            result.findings.iter().filter(|f| f.rule == RULE_BLOCK).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_distinct_files_are_clean() {
        let project = TestProject::new()
            .with_lines("src/a.rs", 40)
            .with_file("src/b.rs", SHARED);

        let result = detector().scan(&project.file_set()).await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_near_identical_files_reported_once_as_file() {
        let project = TestProject::new()
            .with_lines("src/a.rs", 30)
            .with_lines("src/b.rs", 30);

        let result = detector().scan(&project.file_set()).await.unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].rule, RULE_FILE);
        assert_eq!(result.findings[0].file, "src/b.rs");
        assert!(result.findings[0].message.contains("100%"));
    }

    #[tokio::test]
    async fn test_different_extensions_not_compared_whole() {
        let project = TestProject::new()
            .with_lines("src/a.rs", 30)
            .with_lines("web/a.ts", 30);

        let result = detector().scan(&project.file_set()).await.unwrap();
        assert!(result.findings.iter().all(|f| f.rule == RULE_BLOCK));
        assert!(!result.findings.is_empty());
    }

    #[tokio::test]
    async fn test_pairwise_comparison_yields_to_timeout() {
        let files: Vec<NormalizedFile> = (0..800)
            .map(|f| NormalizedFile {
                display: format!("src/m{f}.rs"),
                extension: "rs".to_string(),
                lines: (0..40)
                    .map(|i| (i + 1, format!("let value_{f}_{i} = compute({i});")))
                    .collect(),
            })
            .collect();

        let detector = detector();
        let bounded = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            detector.similar_files(&files),
        )
        .await;
        assert!(bounded.is_err(), "comparison ran to completion without yielding");
    }
}
