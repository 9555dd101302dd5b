//! Configuration management for qgate.
//!
//! Configuration lives in `.qgate/config.toml`. Every field has a default, so
//! an absent file, or an absent section, means "use the defaults". All the
//! files qgate reads or writes are rooted in the `.qgate/` directory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{QgateError, Result};
use crate::policy::EnforcementLevel;

/// Directory (relative to the project root) holding qgate state.
pub const STATE_DIR: &str = ".qgate";

/// Lower bound for a gate timeout, in seconds.
pub const MIN_GATE_TIMEOUT_SECS: u64 = 5;

/// Upper bound for a gate timeout, in seconds.
pub const MAX_GATE_TIMEOUT_SECS: u64 = 60;

/// Default directories excluded from every scope.
///
/// Matched against whole path components.
pub fn default_ignore_dirs() -> HashSet<&'static str> {
    [
        "node_modules",
        ".next",
        "target",
        ".venv",
        "venv",
        "__pycache__",
        "dist",
        "build",
        "vendor",
        ".git",
        ".hg",
        ".svn",
        ".turbo",
        "coverage",
        ".nyc_output",
        ".pytest_cache",
        ".mypy_cache",
        ".ruff_cache",
        "htmlcov",
        ".tox",
        ".qgate",
    ]
    .into_iter()
    .collect()
}

/// Default file-name patterns excluded from every scope.
///
/// Matched against the final path component, exactly or as a glob.
pub fn default_ignore_files() -> HashSet<&'static str> {
    [
        "package-lock.json",
        "pnpm-lock.yaml",
        "yarn.lock",
        "Cargo.lock",
        "poetry.lock",
        "Gemfile.lock",
        "composer.lock",
        ".DS_Store",
        "*.min.js",
        "*.min.css",
        "*.map",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Sections
// ============================================================================

/// File scope settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Extra directory names to exclude.
    pub exclude_dirs: Vec<String>,
    /// Extra file-name patterns to exclude.
    pub exclude_files: Vec<String>,
    /// Upstream ref for push-range diffs (default: the branch's `@{upstream}`).
    pub upstream: Option<String>,
}

/// Per-gate timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout applied to every gate without an override.
    pub default_secs: u64,
    /// Overrides keyed by gate name.
    pub per_gate: BTreeMap<String, u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: 30,
            per_gate: BTreeMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Timeout for the named gate, clamped to the supported window.
    #[must_use]
    pub fn for_gate(&self, gate: &str) -> u64 {
        self.per_gate
            .get(gate)
            .copied()
            .unwrap_or(self.default_secs)
            .clamp(MIN_GATE_TIMEOUT_SECS, MAX_GATE_TIMEOUT_SECS)
    }
}

/// Enforcement overrides for one gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLevels {
    pub commit: Option<EnforcementLevel>,
    pub push: Option<EnforcementLevel>,
    pub ci: Option<EnforcementLevel>,
}

impl ContextLevels {
    /// The override for a context, if one is set.
    #[must_use]
    pub fn get(&self, context: Context) -> Option<EnforcementLevel> {
        match context {
            Context::Commit => self.commit,
            Context::Push => self.push,
            Context::Ci => self.ci,
        }
    }
}

/// Hidden-TODO detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiddenTodoConfig {
    /// Minimum confidence in [-1, 1] for a finding to be kept.
    pub confidence_threshold: f64,
    /// Whether broad-keyword hits skip the confidence threshold.
    pub broad_keyword_bypass: bool,
    /// Append a structured-TODO template to unstructured findings.
    pub suggest_templates: bool,
}

impl Default for HiddenTodoConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            broad_keyword_bypass: crate::gates::hidden_todo::BROAD_KEYWORD_BYPASSES_CONFIDENCE,
            suggest_templates: false,
        }
    }
}

/// God-object detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GodObjectConfig {
    pub warning_lines: usize,
    pub critical_lines: usize,
    pub crisis_lines: usize,
    /// Only the crisis tier blocks; the critical tier is downgraded to advisory.
    pub crisis_mode: bool,
}

impl Default for GodObjectConfig {
    fn default() -> Self {
        Self {
            warning_lines: 1500,
            critical_lines: 2000,
            crisis_lines: 3000,
            crisis_mode: false,
        }
    }
}

/// Duplication detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicationConfig {
    /// Normalized lines per hashed window.
    pub window_lines: usize,
    /// Jaccard similarity at which two whole files count as duplicates.
    pub file_similarity: f64,
    /// Files shorter than this (normalized lines) are not compared whole.
    pub min_file_lines: usize,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            window_lines: 6,
            file_similarity: 0.8,
            min_file_lines: 20,
        }
    }
}

/// Naming detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Words that must not appear as a name segment (`enhanced_parser.rs`).
    pub banned_modifiers: Vec<String>,
    /// Check symbol naming conventions in addition to file names.
    pub check_symbols: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            banned_modifiers: [
                "enhanced", "improved", "new", "final", "copy", "unified", "better", "updated",
                "fixed", "refactored", "simplified", "v2", "old", "temp",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            check_symbols: true,
        }
    }
}

/// Documentation-quality detector settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentationConfig {
    /// Where temporal/status documents are allowed to live.
    pub archive_dir: String,
    /// Extensions (without dot) treated as prose documents.
    pub extensions: Vec<String>,
}

impl Default for DocumentationConfig {
    fn default() -> Self {
        Self {
            archive_dir: "docs/archive".to_string(),
            extensions: vec!["md".into(), "mdx".into(), "rst".into(), "txt".into()],
        }
    }
}

/// Placeholder-governance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    /// Maximum declared placeholders per artifact.
    pub max_placeholders: usize,
    /// Maximum severity-weighted debt per artifact.
    pub max_debt_score: u32,
    pub weight_non_blocking: u32,
    pub weight_partial: u32,
    pub weight_blocks_acceptance: u32,
    /// Scopes where placeholders are forbidden outright.
    pub non_degradable_scopes: Vec<String>,
    /// Lines after an inline declaration that it covers.
    pub coverage_window: usize,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            max_placeholders: 5,
            max_debt_score: 10,
            weight_non_blocking: 1,
            weight_partial: 3,
            weight_blocks_acceptance: 5,
            non_degradable_scopes: vec!["security".into(), "compliance".into()],
            coverage_window: 10,
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Complete qgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QgateConfig {
    pub scope: ScopeConfig,
    pub timeouts: TimeoutConfig,
    /// Enforcement overrides keyed by gate name.
    pub enforcement: BTreeMap<String, ContextLevels>,
    pub hidden_todo: HiddenTodoConfig,
    pub god_object: GodObjectConfig,
    pub duplication: DuplicationConfig,
    pub naming: NamingConfig,
    pub documentation: DocumentationConfig,
    pub placeholder: PlaceholderConfig,
}

impl QgateConfig {
    /// Load configuration from a project directory.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed, or
    /// fails validation.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: QgateConfig = toml::from_str(&content)
            .map_err(|e| QgateError::config_with_path(e.to_string(), path.clone()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`QgateError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let g = &self.god_object;
        if !(g.warning_lines < g.critical_lines && g.critical_lines < g.crisis_lines) {
            return Err(QgateError::InvalidConfig {
                field: "god_object".to_string(),
                reason: "tiers must satisfy warning < critical < crisis".to_string(),
            });
        }
        if !(-1.0..=1.0).contains(&self.hidden_todo.confidence_threshold) {
            return Err(QgateError::InvalidConfig {
                field: "hidden_todo.confidence_threshold".to_string(),
                reason: "must be within [-1, 1]".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.duplication.file_similarity) {
            return Err(QgateError::InvalidConfig {
                field: "duplication.file_similarity".to_string(),
                reason: "must be within [0, 1]".to_string(),
            });
        }
        if self.duplication.window_lines == 0 {
            return Err(QgateError::InvalidConfig {
                field: "duplication.window_lines".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Path of the TOML configuration file
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("config.toml")
    }

    /// Path of the exception policy
    pub fn exceptions_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("exceptions.json")
    }

    /// Path of the run lock marker
    pub fn lock_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("run.lock")
    }

    /// Path of the structured run report
    pub fn report_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("report.json")
    }

    /// Path of the god-object line-count baseline
    pub fn baseline_path(project_dir: &Path) -> PathBuf {
        project_dir.join(STATE_DIR).join("god-object-baseline.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_default() {
        let temp = TempDir::new().unwrap();
        let config = QgateConfig::load(temp.path()).unwrap();
        assert_eq!(config.god_object.critical_lines, 2000);
        assert!(config.hidden_todo.broad_keyword_bypass);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(STATE_DIR)).unwrap();
        std::fs::write(
            QgateConfig::config_path(temp.path()),
            r#"
[god_object]
crisis_mode = true

[enforcement.hidden_todo]
commit = "fail"

[timeouts.per_gate]
duplication = 120
"#,
        )
        .unwrap();

        let config = QgateConfig::load(temp.path()).unwrap();
        assert!(config.god_object.crisis_mode);
        assert_eq!(config.god_object.warning_lines, 1500);
        assert_eq!(
            config.enforcement["hidden_todo"].get(Context::Commit),
            Some(EnforcementLevel::Fail)
        );
        assert_eq!(config.enforcement["hidden_todo"].get(Context::Ci), None);
        assert_eq!(config.timeouts.for_gate("duplication"), MAX_GATE_TIMEOUT_SECS);
        assert_eq!(config.timeouts.for_gate("naming"), 30);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(STATE_DIR)).unwrap();
        std::fs::write(QgateConfig::config_path(temp.path()), "[god_object\n").unwrap();
        let err = QgateConfig::load(temp.path()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_tier_ordering_validated() {
        let mut config = QgateConfig::default();
        config.god_object.critical_lines = 100;
        assert!(matches!(
            config.validate(),
            Err(QgateError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_timeout_clamped_low() {
        let mut timeouts = TimeoutConfig::default();
        timeouts.per_gate.insert("naming".to_string(), 1);
        assert_eq!(timeouts.for_gate("naming"), MIN_GATE_TIMEOUT_SECS);
    }
}
