//! qgate - polyglot quality gates
//!
//! Scans a bounded set of source files for text-level quality problems
//! (incomplete work, duplication, oversized files, naming, documentation
//! hygiene, placeholder governance) before a commit, a push or a CI run is
//! allowed to proceed.
//!
//! # Architecture
//!
//! - [`scope`] - which files a run looks at, per [`context::Context`]
//! - [`gates`] - the `Finding` contract and one detector per gate
//! - [`policy`] - enforcement levels and time-boxed exceptions
//! - [`orchestrator`] - run lock, concurrent gates with per-gate timeouts
//! - [`report`] - JSON report and CI job summary
//! - [`config`] - `.qgate/config.toml`
//! - [`error`] - error types and exit codes
//! - [`testing`] - mocks for the git and detector seams
//!
//! # Example
//!
//! ```rust,ignore
//! use qgate::{Context, Orchestrator, QgateConfig, RunOptions};
//!
//! let config = QgateConfig::load(".".as_ref())?;
//! let report = Orchestrator::new(".", config)
//!     .run(&RunOptions::new(Context::Ci))
//!     .await?;
//! std::process::exit(report.exit_code());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod gates;
pub mod language;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod scope;
pub mod testing;

// Re-export commonly used types
pub use error::{QgateError, Result, EXIT_OK, EXIT_SYSTEM_FAILURE, EXIT_VIOLATIONS};

pub use config::QgateConfig;
pub use context::Context;

pub use gates::{Detector, Finding, FindingSeverity, GateName, ScanResult};

pub use orchestrator::{GateOutcome, GateRun, Orchestrator, RunLock, RunOptions};

pub use policy::{
    classify, Classification, ClassifiedFinding, EnforcementLevel, EnforcementTable, Exception,
    ExceptionPolicy,
};

pub use report::{GateReport, GateStatus, RunReport};

pub use scope::{FileScopeResolver, FileSet, GitOperations, ScopeSource, SystemGit};

pub use language::Language;
