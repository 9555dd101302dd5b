//! Gate orchestration.
//!
//! One run, start to finish:
//!
//! 1. Take the [`RunLock`] (contention is fatal unless forced; stale locks are
//!    reclaimed).
//! 2. Resolve the file scope for the context.
//! 3. Load the exception policy and resolve enforcement levels.
//! 4. Run every selected gate concurrently, each under its own timeout. A gate
//!    that errors, panics or times out contributes exactly one synthetic
//!    violation; the others are unaffected.
//! 5. Classify, merge in a deterministic order, write the report.
//! 6. Release the lock (also on every error path, via the guard).
//!
//! # Module Structure
//!
//! - [`lock`] - the run lock state machine and its guard

pub mod lock;

pub use lock::{LockMarker, LockState, LockStatus, RunLock, RunLockGuard, STALE_AFTER_SECS};

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::QgateConfig;
use crate::context::Context;
use crate::error::Result;
use crate::gates::{detector_for, Detector, Finding, FindingSeverity, GateName, ScanResult};
use crate::policy::{
    classify, Classification, ClassifiedFinding, EnforcementTable, ExceptionPolicy, PolicyLoad,
};
use crate::report::{GateReport, GateStatus, RunReport};
use crate::scope::{ExclusionFilter, FileScopeResolver, FileSet, GitOperations};

/// Rule of the synthetic violation for a gate that failed to run.
pub const RULE_GATE_ERROR: &str = "GATE_ERROR";

/// Rule of the synthetic violation for a gate that ran out of time.
pub const RULE_TIMEOUT: &str = "TIMEOUT";

/// File recorded on synthetic violations: the whole scope.
const WHOLE_SCOPE: &str = ".";

// ============================================================================
// Options
// ============================================================================

/// What to run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub context: Context,
    /// Gates to run, in canonical order.
    pub gates: Vec<GateName>,
    /// Bypass a live run lock.
    pub force: bool,
    /// Run-level notices raised before the run, such as a malformed config.
    pub notices: Vec<String>,
}

impl RunOptions {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            gates: GateName::ALL.to_vec(),
            force: false,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_gates(mut self, gates: Vec<GateName>) -> Self {
        self.gates = gates;
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_notices(mut self, notices: Vec<String>) -> Self {
        self.notices = notices;
        self
    }
}

// ============================================================================
// Gate Execution
// ============================================================================

/// Raw result of running one gate, before classification.
#[derive(Debug, Clone)]
pub struct GateRun {
    pub gate: GateName,
    pub duration_ms: u64,
    pub outcome: GateOutcome,
}

/// How a single gate execution ended.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Completed(ScanResult),
    Failed(String),
    TimedOut(Duration),
}

impl GateRun {
    /// The synthetic finding for a failed or timed-out gate.
    pub fn synthetic_finding(&self) -> Option<Finding> {
        let (rule, message) = match &self.outcome {
            GateOutcome::Completed(_) => return None,
            GateOutcome::Failed(e) => (RULE_GATE_ERROR, format!("Gate failed to run: {}", e)),
            GateOutcome::TimedOut(limit) => (
                RULE_TIMEOUT,
                format!("Gate did not finish within {}ms", limit.as_millis()),
            ),
        };
        Some(
            Finding::new(self.gate, rule, message, WHOLE_SCOPE)
                .with_severity(FindingSeverity::Error)
                .with_suggestion("Re-run with --verbose; raise the gate timeout if the scope is large"),
        )
    }
}

/// Run one gate under a timeout.
async fn run_single_gate_with_timeout(
    gate: GateName,
    detector: Arc<dyn Detector>,
    files: Arc<FileSet>,
    timeout: Duration,
) -> GateRun {
    let start = Instant::now();
    debug!(gate = %gate, files = files.len(), timeout_ms = timeout.as_millis() as u64, "Starting gate");

    let result = tokio::time::timeout(timeout, detector.scan(&files)).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let outcome = match result {
        Ok(Ok(scan)) => {
            debug!(gate = %gate, findings = scan.findings.len(), duration_ms, "Gate finished");
            GateOutcome::Completed(scan)
        }
        Ok(Err(e)) => {
            let message = format!("{e:#}");
            warn!(gate = %gate, error = %message, "Gate failed");
            GateOutcome::Failed(message)
        }
        Err(_elapsed) => {
            warn!(gate = %gate, timeout_ms = timeout.as_millis() as u64, "Gate timed out");
            GateOutcome::TimedOut(timeout)
        }
    };

    GateRun {
        gate,
        duration_ms,
        outcome,
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs gates for one project.
pub struct Orchestrator {
    project_dir: PathBuf,
    config: QgateConfig,
    detectors: BTreeMap<GateName, Arc<dyn Detector>>,
    timeout_override: Option<Duration>,
}

impl Orchestrator {
    /// Orchestrator with the built-in detector for every gate.
    pub fn new(project_dir: impl AsRef<Path>, config: QgateConfig) -> Self {
        let project_dir = project_dir.as_ref().to_path_buf();
        let detectors = GateName::ALL
            .iter()
            .map(|&gate| (gate, detector_for(gate, &config, &project_dir)))
            .collect();
        Self {
            project_dir,
            config,
            detectors,
            timeout_override: None,
        }
    }

    /// Replace the detector for the gate it reports.
    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.insert(detector.gate(), detector);
        self
    }

    /// Use one timeout for every gate, bypassing the configured window.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    pub fn config(&self) -> &QgateConfig {
        &self.config
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn timeout_for(&self, gate: GateName) -> Duration {
        self.timeout_override
            .unwrap_or_else(|| Duration::from_secs(self.config.timeouts.for_gate(gate.as_str())))
    }

    /// Run the given gates concurrently; results come back in input order.
    pub async fn run_gates(&self, gates: &[GateName], files: &FileSet) -> Vec<GateRun> {
        let files = Arc::new(files.clone());

        let handles: Vec<_> = gates
            .iter()
            .map(|&gate| {
                let detector = self.detectors.get(&gate).cloned();
                let files = Arc::clone(&files);
                let timeout = self.timeout_for(gate);

                tokio::spawn(async move {
                    match detector {
                        Some(detector) => {
                            run_single_gate_with_timeout(gate, detector, files, timeout).await
                        }
                        None => GateRun {
                            gate,
                            duration_ms: 0,
                            outcome: GateOutcome::Failed("no detector registered".to_string()),
                        },
                    }
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(gates)
            .map(|(joined, &gate)| {
                joined.unwrap_or_else(|e| {
                    warn!(gate = %gate, error = %e, "Gate task panicked");
                    GateRun {
                        gate,
                        duration_ms: 0,
                        outcome: GateOutcome::Failed(format!("gate task panicked: {}", e)),
                    }
                })
            })
            .collect()
    }

    /// Full run against the system `git`.
    ///
    /// # Errors
    ///
    /// Returns an error on lock contention or when the report cannot be
    /// written. Gate failures are not errors.
    pub async fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let filter = ExclusionFilter::from_config(&self.project_dir, &self.config.scope);
        let resolver = FileScopeResolver::system(&self.project_dir, filter)
            .with_upstream(self.config.scope.upstream.clone());
        self.run_with_resolver(options, &resolver).await
    }

    /// Full run with an explicit scope resolver.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run`].
    pub async fn run_with_resolver<G: GitOperations>(
        &self,
        options: &RunOptions,
        resolver: &FileScopeResolver<G>,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        let guard = RunLock::new(QgateConfig::lock_path(&self.project_dir)).acquire(options.force)?;
        let mut notices: Vec<String> = options.notices.clone();
        notices.extend(guard.notices().iter().cloned());

        let scope = resolver.resolve(options.context);
        notices.extend(scope.notices.iter().cloned());
        info!(
            run_id = %run_id,
            context = %options.context,
            files = scope.files.len(),
            gates = options.gates.len(),
            "Starting run"
        );

        let PolicyLoad {
            policy,
            notices: policy_notices,
        } = ExceptionPolicy::load(&QgateConfig::exceptions_path(&self.project_dir), timestamp);
        notices.extend(policy_notices);
        let table = EnforcementTable::resolve(options.context, &self.config.enforcement);

        let runs = self.run_gates(&options.gates, &scope.files).await;

        let mut merged = Classification::default();
        let mut gates = Vec::with_capacity(runs.len());
        for run in runs {
            let level = table.level(run.gate);
            let (classification, status, error) = match run.synthetic_finding() {
                Some(finding) => {
                    let status = match run.outcome {
                        GateOutcome::TimedOut(_) => GateStatus::Timeout,
                        _ => GateStatus::Error,
                    };
                    let error = Some(finding.message.clone());
                    let classification = Classification {
                        violations: vec![ClassifiedFinding {
                            finding,
                            level,
                            waiver: None,
                        }],
                        warnings: Vec::new(),
                    };
                    (classification, status, error)
                }
                None => {
                    let GateOutcome::Completed(scan) = run.outcome else {
                        continue;
                    };
                    notices.extend(scan.notices.iter().map(|n| format!("{}: {}", run.gate, n)));
                    let classification = classify(scan.findings, level, &policy, timestamp);
                    let status = if classification.violations.is_empty() {
                        GateStatus::Passed
                    } else {
                        GateStatus::Failed
                    };
                    (classification, status, None)
                }
            };

            gates.push(GateReport {
                gate: run.gate,
                status,
                duration_ms: run.duration_ms,
                violations: classification.violations.len(),
                warnings: classification.warnings.len(),
                error,
            });
            merged.extend(classification);
        }

        merged
            .violations
            .sort_by(|a, b| a.finding.report_order(&b.finding));
        merged
            .warnings
            .sort_by(|a, b| a.finding.report_order(&b.finding));
        gates.sort_by_key(|g| g.gate);

        let report = RunReport {
            run_id,
            timestamp,
            context: options.context,
            scope_source: scope.source,
            files_scoped: scope.files.len(),
            duration_ms: started.elapsed().as_millis() as u64,
            passed: merged.violations.is_empty(),
            gates,
            enforcement: table
                .iter()
                .filter(|(gate, _)| options.gates.contains(*gate))
                .map(|(gate, level)| (*gate, *level))
                .collect(),
            notices,
            violations: merged.violations,
            warnings: merged.warnings,
        };

        report.write(&QgateConfig::report_path(&self.project_dir))?;
        if let Some(target) = RunReport::summary_target() {
            if let Err(e) = report.append_summary(&target) {
                warn!(error = %e, "Failed to append run summary");
            }
        }

        guard.release()?;
        info!(
            violations = report.violations.len(),
            warnings = report.warnings.len(),
            duration_ms = report.duration_ms,
            "Run complete"
        );
        Ok(report)
    }
}
