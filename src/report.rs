//! Run report.
//!
//! One [`RunReport`] per invocation, written as JSON to `.qgate/report.json`
//! and, when a summary target is configured, appended as Markdown to
//! `$QGATE_SUMMARY_FILE` (or `$GITHUB_STEP_SUMMARY` on GitHub Actions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::context::Context;
use crate::error::{QgateError, Result, EXIT_OK, EXIT_VIOLATIONS};
use crate::gates::GateName;
use crate::policy::{ClassifiedFinding, EnforcementLevel};
use crate::scope::ScopeSource;

/// Explicit summary target.
pub const SUMMARY_FILE_ENV: &str = "QGATE_SUMMARY_FILE";

/// GitHub Actions job summary, used when [`SUMMARY_FILE_ENV`] is unset.
pub const GITHUB_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";

/// Violations listed in the Markdown summary before truncating.
const SUMMARY_MAX_ROWS: usize = 50;

/// How a gate ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Timeout => "timeout",
            GateStatus::Error => "error",
        }
    }
}

/// Per-gate line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport {
    pub gate: GateName,
    pub status: GateStatus,
    pub duration_ms: u64,
    pub violations: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub context: Context,
    pub scope_source: ScopeSource,
    pub files_scoped: usize,
    pub duration_ms: u64,
    pub passed: bool,
    pub gates: Vec<GateReport>,
    pub enforcement: BTreeMap<GateName, EnforcementLevel>,
    pub notices: Vec<String>,
    pub violations: Vec<ClassifiedFinding>,
    pub warnings: Vec<ClassifiedFinding>,
}

impl RunReport {
    /// `0` when nothing blocks, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.violations.is_empty() {
            EXIT_OK
        } else {
            EXIT_VIOLATIONS
        }
    }

    /// Write the JSON report, creating the state directory.
    ///
    /// # Errors
    ///
    /// Returns [`QgateError::Report`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| QgateError::report(path, e.to_string()))?;
        }
        fs::write(path, json).map_err(|e| QgateError::report(path, e.to_string()))?;
        info!(path = %path.display(), "Wrote run report");
        Ok(())
    }

    /// Summary target from the environment, if any.
    pub fn summary_target() -> Option<PathBuf> {
        [SUMMARY_FILE_ENV, GITHUB_SUMMARY_ENV]
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .find(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Append the Markdown summary to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`QgateError::Report`] if the file cannot be opened or written.
    pub fn append_summary(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| QgateError::report(path, e.to_string()))?;
        file.write_all(self.to_markdown().as_bytes())
            .map_err(|e| QgateError::report(path, e.to_string()))?;
        Ok(())
    }

    /// Markdown rendering for CI job summaries.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let verdict = if self.passed { "passed" } else { "failed" };
        let _ = writeln!(md, "## qgate: {} ({})\n", verdict, self.context);
        let _ = writeln!(
            md,
            "{} files scoped · {} violations · {} warnings · {} ms\n",
            self.files_scoped,
            self.violations.len(),
            self.warnings.len(),
            self.duration_ms
        );

        let _ = writeln!(md, "| Gate | Level | Status | Violations | Warnings |");
        let _ = writeln!(md, "|------|-------|--------|------------|----------|");
        for gate in &self.gates {
            let level = self
                .enforcement
                .get(&gate.gate)
                .map(ToString::to_string)
                .unwrap_or_default();
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                gate.gate,
                level,
                gate.status.as_str(),
                gate.violations,
                gate.warnings
            );
        }

        if !self.violations.is_empty() {
            let _ = writeln!(md, "\n### Violations\n");
            for v in self.violations.iter().take(SUMMARY_MAX_ROWS) {
                let f = &v.finding;
                let location = match f.line {
                    Some(line) => format!("{}:{}", f.file, line),
                    None => f.file.clone(),
                };
                let _ = writeln!(md, "- `{}` **{}** {} ({})", location, f.rule, f.message, f.gate);
            }
            if self.violations.len() > SUMMARY_MAX_ROWS {
                let _ = writeln!(
                    md,
                    "- ... and {} more in `.qgate/report.json`",
                    self.violations.len() - SUMMARY_MAX_ROWS
                );
            }
        }

        if !self.notices.is_empty() {
            let _ = writeln!(md, "\n### Notices\n");
            for notice in &self.notices {
                let _ = writeln!(md, "- {}", notice);
            }
        }
        md.push('\n');
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{Finding, FindingSeverity};
    use tempfile::TempDir;

    fn report(violations: usize) -> RunReport {
        let finding = |i: usize| ClassifiedFinding {
            finding: Finding::new(GateName::Naming, "BANNED_MODIFIER_FILENAME", "bad name", format!("src/f{i}_v2.rs"))
                .with_severity(FindingSeverity::Error),
            level: EnforcementLevel::Block,
            waiver: None,
        };
        RunReport {
            run_id: "00000000-0000-4000-8000-000000000000".to_string(),
            timestamp: Utc::now(),
            context: Context::Ci,
            scope_source: ScopeSource::TrackedTree,
            files_scoped: 3,
            duration_ms: 12,
            passed: violations == 0,
            gates: vec![GateReport {
                gate: GateName::Naming,
                status: if violations == 0 { GateStatus::Passed } else { GateStatus::Failed },
                duration_ms: 4,
                violations,
                warnings: 0,
                error: None,
            }],
            enforcement: [(GateName::Naming, EnforcementLevel::Block)].into_iter().collect(),
            notices: vec!["No god-object baseline found".to_string()],
            violations: (0..violations).map(finding).collect(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_exit_code_follows_violations() {
        assert_eq!(report(0).exit_code(), EXIT_OK);
        assert_eq!(report(2).exit_code(), EXIT_VIOLATIONS);
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(report(1)).unwrap();
        assert_eq!(value["context"], "ci");
        assert_eq!(value["scopeSource"], "tracked_tree");
        assert_eq!(value["filesScoped"], 3);
        assert_eq!(value["gates"][0]["status"], "failed");
        assert!(value["gates"][0].get("error").is_none());
        assert_eq!(value["enforcement"]["naming"], "block");
        assert_eq!(value["violations"][0]["type"], "BANNED_MODIFIER_FILENAME");
        assert_eq!(value["violations"][0]["level"], "block");
    }

    #[test]
    fn test_write_creates_state_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".qgate").join("report.json");
        report(0).write(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["passed"], true);
    }

    #[test]
    fn test_markdown_summary_appends_and_truncates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("summary.md");
        fs::write(&path, "# existing\n").unwrap();

        report(SUMMARY_MAX_ROWS + 3).append_summary(&path).unwrap();
        let md = fs::read_to_string(&path).unwrap();
        assert!(md.starts_with("# existing\n"));
        assert!(md.contains("## qgate: failed (ci)"));
        assert!(md.contains("| naming | block | failed |"));
        assert!(md.contains("... and 3 more"));
        assert!(md.contains("### Notices"));
    }
}
