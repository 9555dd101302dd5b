//! Git access for scope resolution.
//!
//! [`GitOperations`] is the seam between the resolver and the `git` binary so
//! the resolver can be exercised against [`crate::testing::MockGitOperations`].

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{QgateError, Result};

/// Abstraction for the git queries scope resolution needs.
pub trait GitOperations: Send + Sync {
    /// Whether git is installed and `repo` is inside a work tree.
    fn is_available(&self) -> bool;

    /// Files in the index that differ from HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn staged_files(&self) -> Result<Vec<PathBuf>>;

    /// Files changed between the upstream ref and HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails or there is no upstream.
    fn push_range_files(&self, upstream: Option<&str>) -> Result<Vec<PathBuf>>;

    /// Every tracked file.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn tracked_files(&self) -> Result<Vec<PathBuf>>;
}

/// [`GitOperations`] backed by the `git` executable.
///
/// Paths are listed relative to `repo_path`, which may be a subdirectory of
/// the work tree; files outside it are not listed.
#[derive(Debug, Clone)]
pub struct SystemGit {
    repo_path: PathBuf,
}

impl SystemGit {
    #[must_use]
    pub fn new(repo_path: impl AsRef<Path>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
        }
    }

    fn run(&self, operation: &str, args: &[&str]) -> Result<String> {
        debug!(operation, "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| QgateError::git(operation, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(QgateError::git(operation, stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitOperations for SystemGit {
    fn is_available(&self) -> bool {
        if which::which("git").is_err() {
            return false;
        }
        self.run("rev-parse", &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.run(
            "diff --cached",
            &[
                "diff",
                "--cached",
                "--name-status",
                "--relative",
                "-z",
                "--diff-filter=ACMR",
                "-M",
            ],
        )?;
        Ok(parse_name_status_z(&out))
    }

    fn push_range_files(&self, upstream: Option<&str>) -> Result<Vec<PathBuf>> {
        let upstream = upstream.unwrap_or("@{upstream}");
        let range = format!("{}...HEAD", upstream);
        let out = self.run(
            "diff (push range)",
            &[
                "diff",
                "--name-status",
                "--relative",
                "-z",
                "--diff-filter=ACMR",
                "-M",
                &range,
            ],
        )?;
        Ok(parse_name_status_z(&out))
    }

    fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let out = self.run("ls-files", &["ls-files", "-z"])?;
        Ok(parse_nul_file_list(&out))
    }
}

/// Parse `git diff --name-status -z` output.
///
/// Fields are NUL-separated and unquoted: `STATUS\0path\0`, or
/// `STATUS\0old\0new\0` for renames and copies (the new path is kept).
pub fn parse_name_status_z(output: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut fields = output.split('\0').filter(|f| !f.is_empty());

    while let Some(status) = fields.next() {
        let paired = status.starts_with('R') || status.starts_with('C');
        let path = if paired {
            fields.next();
            fields.next()
        } else {
            fields.next()
        };
        match path {
            Some(p) => files.push(PathBuf::from(p)),
            None => break,
        }
    }

    files
}

/// Parse a NUL-separated list of paths (`git ls-files -z`).
pub fn parse_nul_file_list(output: &str) -> Vec<PathBuf> {
    output
        .split('\0')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}
