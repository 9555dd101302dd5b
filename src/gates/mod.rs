//! Detectors and the contract they share.
//!
//! Every gate is a stateless [`Detector`]: it receives the run's [`FileSet`]
//! and returns an immutable [`ScanResult`]. Detectors never classify their own
//! output; policy resolution happens afterwards in [`crate::policy`].
//!
//! # Available Gates
//!
//! - [`naming`] - banned name modifiers and symbol conventions
//! - [`duplication`] - duplicated blocks and near-identical files
//! - [`god_object`] - oversized files and size regressions
//! - [`hidden_todo`] - hidden TODOs, disguised stubs and placeholder code
//! - [`documentation`] - marketing language, status docs, decorative symbols
//! - [`placeholder`] - placeholder governance for declared degradations

pub mod documentation;
pub mod duplication;
pub mod god_object;
pub mod hidden_todo;
pub mod naming;
pub mod placeholder;
pub mod source;

pub use source::{SourceFile, SourceLoader};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::QgateConfig;
use crate::error::{QgateError, Result};
use crate::scope::FileSet;

// ============================================================================
// Gate Names
// ============================================================================

/// The closed set of gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    Naming,
    Duplication,
    GodObject,
    HiddenTodo,
    Documentation,
    Placeholder,
}

impl GateName {
    /// Every gate, in execution and report order.
    pub const ALL: [GateName; 6] = [
        GateName::Naming,
        GateName::Duplication,
        GateName::GodObject,
        GateName::HiddenTodo,
        GateName::Documentation,
        GateName::Placeholder,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GateName::Naming => "naming",
            GateName::Duplication => "duplication",
            GateName::GodObject => "god_object",
            GateName::HiddenTodo => "hidden_todo",
            GateName::Documentation => "documentation",
            GateName::Placeholder => "placeholder",
        }
    }

    /// One-line description for `qgate gates`.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            GateName::Naming => "Banned name modifiers and symbol naming conventions",
            GateName::Duplication => "Duplicated code blocks and near-identical files",
            GateName::GodObject => "Oversized files and size regressions against the baseline",
            GateName::HiddenTodo => "Hidden TODOs, disguised incomplete work and stub code",
            GateName::Documentation => {
                "Marketing language, unfounded claims, misplaced status docs, decorative symbols"
            }
            GateName::Placeholder => "Placeholder schema, registry, debt budget and dangling promises",
        }
    }

    /// Names of every gate, for error messages.
    pub fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|g| g.as_str().to_string()).collect()
    }

    /// Parse a comma-separated gate list.
    ///
    /// The whole list is validated before anything is returned. The result is
    /// deduplicated and in canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`QgateError::UnknownGate`] for the first name outside the
    /// closed set.
    pub fn parse_list(list: &str) -> Result<Vec<GateName>> {
        let mut gates = Vec::new();
        for raw in list.split(',') {
            let name = raw.trim();
            if name.is_empty() {
                continue;
            }
            gates.push(name.parse::<GateName>()?);
        }
        gates.sort();
        gates.dedup();
        Ok(gates)
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateName {
    type Err = QgateError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == wanted)
            .ok_or_else(|| QgateError::UnknownGate {
                name: wanted.to_string(),
                valid: Self::valid_names(),
            })
    }
}

// ============================================================================
// Findings
// ============================================================================

/// Detector-assigned severity.
///
/// `Info` and `Warning` are advisory: such findings never become violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Raw detector output, before policy resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub gate: GateName,
    /// Rule identifier, e.g. `BROAD_KEYWORD`.
    #[serde(rename = "type")]
    pub rule: String,
    pub message: String,
    /// Repository-relative path with `/` separators.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<FindingSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Finding {
    pub fn new(
        gate: GateName,
        rule: impl Into<String>,
        message: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            rule: rule.into(),
            message: message.into(),
            file: file.into(),
            line: None,
            severity: None,
            confidence: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: FindingSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Total order used to make reports deterministic.
    pub fn report_order(&self, other: &Self) -> Ordering {
        self.gate
            .cmp(&other.gate)
            .then_with(|| self.file.cmp(&other.file))
            .then_with(|| self.line.cmp(&other.line))
            .then_with(|| self.rule.cmp(&other.rule))
            .then_with(|| self.message.cmp(&other.message))
    }
}

/// Render a repository-relative path the way findings carry it.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Detector Contract
// ============================================================================

/// What a detector hands back to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    /// Run-level remarks (skipped checks, degraded inputs).
    pub notices: Vec<String>,
}

impl ScanResult {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notices.push(notice.into());
        self
    }
}

/// A stateless scanner behind one gate.
#[async_trait]
pub trait Detector: Send + Sync {
    /// The gate this detector implements.
    fn gate(&self) -> GateName;

    /// Scan the file set.
    ///
    /// # Errors
    ///
    /// An error fails only this gate; the orchestrator records it as a
    /// synthetic violation and keeps going.
    async fn scan(&self, files: &FileSet) -> anyhow::Result<ScanResult>;
}

/// Build the detector for a gate from configuration.
pub fn detector_for(gate: GateName, config: &QgateConfig, project_dir: &Path) -> Arc<dyn Detector> {
    match gate {
        GateName::Naming => Arc::new(naming::NamingDetector::new(config.naming.clone())),
        GateName::Duplication => Arc::new(duplication::DuplicationDetector::new(
            config.duplication.clone(),
        )),
        GateName::GodObject => Arc::new(god_object::GodObjectDetector::new(
            config.god_object.clone(),
            QgateConfig::baseline_path(project_dir),
        )),
        GateName::HiddenTodo => Arc::new(
            hidden_todo::HiddenTodoDetector::new(config.hidden_todo.clone())
                .with_coverage_window(config.placeholder.coverage_window),
        ),
        GateName::Documentation => Arc::new(documentation::DocumentationDetector::new(
            config.documentation.clone(),
        )),
        GateName::Placeholder => Arc::new(placeholder::PlaceholderDetector::new(
            config.placeholder.clone(),
        )),
    }
}
