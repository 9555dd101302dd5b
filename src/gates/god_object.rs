//! God-object gate.
//!
//! Flags oversized source files in three tiers and files that newly crossed
//! the blocking threshold since the baseline was recorded.
//!
//! | Tier | Default | Normal mode | Crisis mode |
//! |------|---------|-------------|-------------|
//! | warning | 1500 lines | advisory | advisory |
//! | critical | 2000 lines | blocking | advisory |
//! | crisis | 3000 lines | blocking | blocking |
//!
//! The regression check compares each file against
//! `.qgate/god-object-baseline.json`: a file whose recorded size was under the
//! blocking threshold and whose current size is at or over it is a regression.
//! Files absent from the baseline count as zero lines. The tier finding and
//! the regression finding are independent and both reported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{Detector, Finding, FindingSeverity, GateName, ScanResult, SourceFile, SourceLoader};
use crate::config::GodObjectConfig;
use crate::error::{QgateError, Result};
use crate::language::Language;
use crate::scope::FileSet;

pub const RULE_WARNING: &str = "GOD_OBJECT_WARNING";
pub const RULE_CRITICAL: &str = "GOD_OBJECT_CRITICAL";
pub const RULE_CRISIS: &str = "GOD_OBJECT_CRISIS";
pub const RULE_REGRESSION: &str = "GOD_OBJECT_REGRESSION";

// ============================================================================
// Baseline
// ============================================================================

/// Recorded line counts per file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub generated_at: Option<DateTime<Utc>>,
    /// Repository-relative path to line count.
    pub files: BTreeMap<String, usize>,
}

impl Baseline {
    /// Load a baseline; `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let baseline = serde_json::from_str(&content)?;
        Ok(Some(baseline))
    }

    /// Write the baseline, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| QgateError::report(path, e.to_string()))?;
        info!(path = %path.display(), files = self.files.len(), "Wrote god-object baseline");
        Ok(())
    }

    /// Record the current size of every source file in `files`.
    pub async fn capture(files: &FileSet) -> Self {
        let sources = SourceLoader::default()
            .load(GateName::GodObject, files, is_source)
            .await;
        Self {
            generated_at: Some(Utc::now()),
            files: sources
                .iter()
                .map(|s| (s.display.clone(), s.line_count()))
                .collect(),
        }
    }

    /// Recorded size; files never recorded count as zero.
    pub fn lines_for(&self, file: &str) -> usize {
        self.files.get(file).copied().unwrap_or(0)
    }
}

fn is_source(path: &Path) -> bool {
    Language::from_path(path).is_some()
}

// ============================================================================
// Detector
// ============================================================================

/// Detector for the god-object gate.
pub struct GodObjectDetector {
    config: GodObjectConfig,
    baseline_path: PathBuf,
}

impl GodObjectDetector {
    pub fn new(config: GodObjectConfig, baseline_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            baseline_path: baseline_path.into(),
        }
    }

    /// The size at which a file starts blocking.
    pub fn blocking_threshold(&self) -> usize {
        if self.config.crisis_mode {
            self.config.crisis_lines
        } else {
            self.config.critical_lines
        }
    }

    fn tier_finding(&self, source: &SourceFile, lines: usize) -> Option<Finding> {
        let c = &self.config;
        let (rule, limit, severity) = if lines >= c.crisis_lines {
            (RULE_CRISIS, c.crisis_lines, FindingSeverity::Error)
        } else if lines >= c.critical_lines {
            let severity = if c.crisis_mode {
                FindingSeverity::Warning
            } else {
                FindingSeverity::Error
            };
            (RULE_CRITICAL, c.critical_lines, severity)
        } else if lines >= c.warning_lines {
            (RULE_WARNING, c.warning_lines, FindingSeverity::Warning)
        } else {
            return None;
        };

        Some(
            Finding::new(
                GateName::GodObject,
                rule,
                format!("File has {} lines (limit {})", lines, limit),
                source.display.clone(),
            )
            .with_severity(severity)
            .with_suggestion("Split the file along its responsibilities"),
        )
    }

    fn regression_finding(
        &self,
        source: &SourceFile,
        lines: usize,
        baseline: &Baseline,
    ) -> Option<Finding> {
        let threshold = self.blocking_threshold();
        let before = baseline.lines_for(&source.display);
        if before >= threshold || lines < threshold {
            return None;
        }
        Some(
            Finding::new(
                GateName::GodObject,
                RULE_REGRESSION,
                format!(
                    "File grew from {} to {} lines, crossing the {}-line threshold",
                    before, lines, threshold
                ),
                source.display.clone(),
            )
            .with_severity(FindingSeverity::Error)
            .with_suggestion("Revert the growth or split the file before it lands"),
        )
    }
}

#[async_trait]
impl Detector for GodObjectDetector {
    fn gate(&self) -> GateName {
        GateName::GodObject
    }

    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult> {
        let mut notices = Vec::new();
        let baseline = match Baseline::load(&self.baseline_path) {
            Ok(Some(b)) => Some(b),
            Ok(None) => {
                notices.push(
                    "No god-object baseline found; regression check skipped (run `qgate baseline`)"
                        .to_string(),
                );
                None
            }
            Err(e) => {
                warn!(path = %self.baseline_path.display(), error = %e, "Unreadable god-object baseline");
                notices.push(format!(
                    "God-object baseline could not be read ({}); regression check skipped",
                    e
                ));
                None
            }
        };

        let sources = SourceLoader::default()
            .load(GateName::GodObject, files, is_source)
            .await;

        let mut findings = Vec::new();
        for source in &sources {
            let lines = source.line_count();
            findings.extend(self.tier_finding(source, lines));
            if let Some(ref baseline) = baseline {
                findings.extend(self.regression_finding(source, lines, baseline));
            }
            tokio::task::yield_now().await;
        }

        Ok(ScanResult {
            findings,
            notices,
        })
    }
}
