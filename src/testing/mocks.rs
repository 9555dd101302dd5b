//! Mock implementations of testing seams.
//!
//! These mocks provide controllable test doubles for external dependencies,
//! enabling deterministic unit tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{QgateError, Result};
use crate::gates::{Detector, Finding, GateName, ScanResult};
use crate::scope::{FileSet, GitOperations};

/// Mock implementation of git operations.
///
/// # Example
///
/// ```rust
/// use qgate::scope::GitOperations;
/// use qgate::testing::MockGitOperations;
///
/// let git = MockGitOperations::new().with_staged(&["src/lib.rs"]);
/// assert_eq!(git.staged_files().unwrap().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockGitOperations {
    available: bool,
    staged: Vec<PathBuf>,
    push_range: Option<Vec<PathBuf>>,
    tracked: Vec<PathBuf>,
}

impl Default for MockGitOperations {
    fn default() -> Self {
        Self {
            available: true,
            staged: Vec::new(),
            push_range: Some(Vec::new()),
            tracked: Vec::new(),
        }
    }
}

impl MockGitOperations {
    /// Create a new mock with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend git is not installed.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Set the staged files.
    #[must_use]
    pub fn with_staged(mut self, files: &[&str]) -> Self {
        self.staged = files.iter().map(PathBuf::from).collect();
        self
    }

    /// Set the files in the push range.
    #[must_use]
    pub fn with_push_range(mut self, files: &[&str]) -> Self {
        self.push_range = Some(files.iter().map(PathBuf::from).collect());
        self
    }

    /// Make push-range resolution fail (e.g. no upstream configured).
    #[must_use]
    pub fn with_failing_push_range(mut self) -> Self {
        self.push_range = None;
        self
    }

    /// Set the tracked files.
    #[must_use]
    pub fn with_tracked(mut self, files: &[&str]) -> Self {
        self.tracked = files.iter().map(PathBuf::from).collect();
        self
    }
}

impl GitOperations for MockGitOperations {
    fn is_available(&self) -> bool {
        self.available
    }

    fn staged_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.staged.clone())
    }

    fn push_range_files(&self, _upstream: Option<&str>) -> Result<Vec<PathBuf>> {
        self.push_range
            .clone()
            .ok_or_else(|| QgateError::git("diff (push range)", "no upstream configured"))
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self.tracked.clone())
    }
}

// ============================================================================
// Mock Detector
// ============================================================================

/// What a [`MockDetector`] does when scanned.
#[derive(Debug, Clone)]
enum Behavior {
    Return(ScanResult),
    Fail(String),
    Hang(Duration),
    Panic,
}

/// Detector double with scripted behavior.
///
/// # Example
///
/// ```rust
/// use qgate::gates::{Finding, GateName};
/// use qgate::testing::MockDetector;
///
/// let detector = MockDetector::new(GateName::Naming)
///     .with_findings(vec![Finding::new(GateName::Naming, "RULE", "msg", "a.rs")]);
/// assert_eq!(detector.scans(), 0);
/// ```
#[derive(Debug)]
pub struct MockDetector {
    gate: GateName,
    behavior: Behavior,
    scans: AtomicUsize,
}

impl MockDetector {
    /// A detector that finds nothing.
    #[must_use]
    pub fn new(gate: GateName) -> Self {
        Self {
            gate,
            behavior: Behavior::Return(ScanResult::default()),
            scans: AtomicUsize::new(0),
        }
    }

    /// Return these findings.
    #[must_use]
    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.behavior = Behavior::Return(ScanResult::new(findings));
        self
    }

    /// Return this scan result, notices included.
    #[must_use]
    pub fn with_result(mut self, result: ScanResult) -> Self {
        self.behavior = Behavior::Return(result);
        self
    }

    /// Fail with an error.
    #[must_use]
    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    /// Sleep this long before returning nothing.
    #[must_use]
    pub fn hanging(mut self, duration: Duration) -> Self {
        self.behavior = Behavior::Hang(duration);
        self
    }

    /// Panic inside the scan.
    #[must_use]
    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    /// How many times `scan` was called.
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for MockDetector {
    fn gate(&self) -> GateName {
        self.gate
    }

    async fn scan(&self, _files: &FileSet) -> anyhow::Result<ScanResult> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Return(result) => Ok(result.clone()),
            Behavior::Fail(message) => Err(anyhow::anyhow!("{}", message)),
            Behavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ScanResult::default())
            }
            Behavior::Panic => panic!("mock detector panicked"),
        }
    }
}
