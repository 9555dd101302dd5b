//! File scope resolution.
//!
//! Turns an invocation [`Context`] into the bounded, ordered [`FileSet`] that
//! every gate in the run shares:
//!
//! | Context | Source |
//! |---------|--------|
//! | `commit` | staged diff |
//! | `push` | diff between upstream and HEAD |
//! | `ci` | every tracked file |
//!
//! When git cannot answer, the resolver walks the whole tree instead (honouring
//! ignore files) and records a notice. It never crashes and never quietly
//! returns zero files because of a failure.

pub mod exclusions;
pub mod git;

pub use exclusions::{ExclusionFilter, IGNORE_FILE};
pub use git::{GitOperations, SystemGit};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::Context;

/// Deduplicated, ordered, exclusion-filtered repository-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileSet {
    #[serde(skip)]
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl FileSet {
    /// Build a file set; input order and duplicates do not matter.
    pub fn new(root: impl AsRef<Path>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        let unique: BTreeSet<PathBuf> = files.into_iter().collect();
        Self {
            root: root.as_ref().to_path_buf(),
            files: unique.into_iter().collect(),
        }
    }

    /// Project root the paths are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Absolute path of a member.
    pub fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// Where the file list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSource {
    StagedDiff,
    PushRange,
    TrackedTree,
    /// Filesystem walk, used when git could not answer.
    FullTreeFallback,
}

/// A resolved scope plus anything worth telling the user about it.
#[derive(Debug, Clone)]
pub struct ScopeResolution {
    pub files: FileSet,
    pub source: ScopeSource,
    pub notices: Vec<String>,
}

/// Resolves the file scope for a context.
pub struct FileScopeResolver<G: GitOperations> {
    project_dir: PathBuf,
    git: G,
    filter: ExclusionFilter,
    upstream: Option<String>,
}

impl FileScopeResolver<SystemGit> {
    /// Resolver backed by the system `git`.
    pub fn system(project_dir: impl AsRef<Path>, filter: ExclusionFilter) -> Self {
        Self::new(project_dir.as_ref(), SystemGit::new(project_dir.as_ref()), filter)
    }
}

impl<G: GitOperations> FileScopeResolver<G> {
    pub fn new(project_dir: impl AsRef<Path>, git: G, filter: ExclusionFilter) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            git,
            filter,
            upstream: None,
        }
    }

    /// Diff push ranges against this ref instead of `@{upstream}`.
    #[must_use]
    pub fn with_upstream(mut self, upstream: Option<String>) -> Self {
        self.upstream = upstream;
        self
    }

    /// Resolve the file set for `context`.
    pub fn resolve(&self, context: Context) -> ScopeResolution {
        let mut notices = Vec::new();

        let from_git = if self.git.is_available() {
            let (source, listed) = match context {
                Context::Commit => (ScopeSource::StagedDiff, self.git.staged_files()),
                Context::Push => (
                    ScopeSource::PushRange,
                    self.git.push_range_files(self.upstream.as_deref()),
                ),
                Context::Ci => (ScopeSource::TrackedTree, self.git.tracked_files()),
            };
            match listed {
                Ok(paths) => Some((source, paths)),
                Err(e) => {
                    warn!(context = %context, error = %e, "Scope resolution failed, falling back to full tree");
                    notices.push(format!(
                        "Could not resolve {} scope ({}); analyzed the full tree instead",
                        context, e
                    ));
                    None
                }
            }
        } else {
            warn!(context = %context, "git unavailable, falling back to full tree");
            notices.push(format!(
                "git is unavailable; analyzed the full tree instead of the {} scope",
                context
            ));
            None
        };

        let (source, candidates) = match from_git {
            Some(found) => found,
            None => (ScopeSource::FullTreeFallback, self.walk_tree()),
        };

        let files = self.finalize(candidates);
        debug!(context = %context, source = ?source, files = files.len(), "Resolved file scope");

        if files.is_empty() {
            notices.push(format!("No files in {} scope", context));
        }

        ScopeResolution {
            files,
            source,
            notices,
        }
    }

    /// Full-tree listing via the filesystem, respecting ignore files.
    fn walk_tree(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let walker = WalkBuilder::new(&self.project_dir)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .add_custom_ignore_filename(IGNORE_FILE)
            .filter_entry(|e| e.file_name() != ".git")
            .build();

        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.project_dir) {
                out.push(rel.to_path_buf());
            }
        }
        out
    }

    /// Drop excluded and vanished paths, dedupe and sort.
    fn finalize(&self, candidates: Vec<PathBuf>) -> FileSet {
        let kept = candidates
            .into_iter()
            .filter(|p| !self.filter.is_excluded(p))
            .filter(|p| self.project_dir.join(p).is_file());
        FileSet::new(&self.project_dir, kept)
    }
}
