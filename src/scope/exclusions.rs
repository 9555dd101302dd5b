//! Path exclusion rules.
//!
//! Every rule matches whole path components, never raw substrings:
//!
//! - a directory rule (`vendor`, `docs/generated`) matches when its segments
//!   appear as consecutive directory components of the path;
//! - a file rule (`Cargo.lock`, `*.min.js`) matches the final component,
//!   exactly or as a glob;
//! - patterns from a `.qgateignore` file at the project root use gitignore
//!   syntax.
//!
//! So `vendor/` excludes `vendor/lib.rs` and `a/vendor/b.rs` but not
//! `src/vendored_types.rs`.

use std::collections::HashSet;
use std::path::{Component, Path};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::warn;

use crate::config::{default_ignore_dirs, default_ignore_files, ScopeConfig};

/// Name of the project-level ignore file.
pub const IGNORE_FILE: &str = ".qgateignore";

/// Decides which repository-relative paths are out of scope.
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
    dir_rules: Vec<Vec<String>>,
    file_names: HashSet<String>,
    file_globs: GlobSet,
    ignore_file: Option<Gitignore>,
}

impl Default for ExclusionFilter {
    fn default() -> Self {
        Self::new(
            default_ignore_dirs().into_iter(),
            default_ignore_files().into_iter(),
        )
    }
}

impl ExclusionFilter {
    /// Build a filter from directory and file rules.
    pub fn new<'a>(
        dirs: impl Iterator<Item = &'a str>,
        files: impl Iterator<Item = &'a str>,
    ) -> Self {
        let mut dir_rules: Vec<Vec<String>> = dirs
            .map(|d| {
                d.split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|segments| !segments.is_empty())
            .collect();
        dir_rules.sort();
        dir_rules.dedup();

        let mut file_names = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        for pattern in files {
            if pattern.contains(['*', '?', '[']) {
                match Glob::new(pattern) {
                    Ok(glob) => {
                        builder.add(glob);
                    }
                    Err(e) => warn!(pattern, error = %e, "Ignoring invalid file exclusion glob"),
                }
            } else {
                file_names.insert(pattern.to_string());
            }
        }
        let file_globs = builder.build().unwrap_or_else(|_| GlobSet::empty());

        Self {
            dir_rules,
            file_names,
            file_globs,
            ignore_file: None,
        }
    }

    /// Defaults extended with the configured extras and the project's
    /// ignore file.
    pub fn from_config(project_dir: &Path, config: &ScopeConfig) -> Self {
        let dirs: Vec<String> = default_ignore_dirs()
            .into_iter()
            .map(str::to_string)
            .chain(config.exclude_dirs.iter().cloned())
            .collect();
        let files: Vec<String> = default_ignore_files()
            .into_iter()
            .map(str::to_string)
            .chain(config.exclude_files.iter().cloned())
            .collect();

        let mut filter = Self::new(
            dirs.iter().map(String::as_str),
            files.iter().map(String::as_str),
        );
        filter.ignore_file = load_ignore_file(project_dir);
        filter
    }

    /// Whether a repository-relative path is excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let components: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        let Some((file_name, dirs)) = components.split_last() else {
            return true;
        };

        if self.dir_rules.iter().any(|rule| contains_run(dirs, rule)) {
            return true;
        }

        if self.file_names.contains(*file_name) || self.file_globs.is_match(file_name) {
            return true;
        }

        if let Some(ref ignore) = self.ignore_file {
            if ignore.matched_path_or_any_parents(path, false).is_ignore() {
                return true;
            }
        }

        false
    }
}

/// Whether `rule` occurs as a consecutive run inside `dirs`.
fn contains_run(dirs: &[&str], rule: &[String]) -> bool {
    if rule.len() > dirs.len() {
        return false;
    }
    dirs.windows(rule.len())
        .any(|w| w.iter().zip(rule).all(|(a, b)| *a == b.as_str()))
}

fn load_ignore_file(project_dir: &Path) -> Option<Gitignore> {
    let path = project_dir.join(IGNORE_FILE);
    if !path.is_file() {
        return None;
    }

    let mut builder = GitignoreBuilder::new(project_dir);
    if let Some(e) = builder.add(&path) {
        warn!(path = %path.display(), error = %e, "Partially invalid ignore file");
    }
    match builder.build() {
        Ok(gi) => Some(gi),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable ignore file");
            None
        }
    }
}
