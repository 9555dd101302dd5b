//! Batched, non-blocking source loading shared by the detectors.
//!
//! Files are read a batch at a time: every read in a batch is in flight at
//! once, and the next batch starts only when the current one is done. This
//! bounds open descriptors while still overlapping I/O latency. Non-UTF-8
//! files are skipped.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{display_path, GateName};
use crate::scope::FileSet;

/// Default number of reads in flight per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Extensions of prose and data files, which carry no code or comments.
///
/// Markup, stylesheets and config files are not listed: their comments are
/// scanned with the fallback profile.
pub const PROSE_AND_DATA_EXTENSIONS: &[&str] = &[
    "md", "mdx", "rst", "txt", "adoc", "json", "jsonc", "lock", "csv", "tsv", "svg", "snap",
    "log",
];

/// Whether a path is prose or data rather than source code.
pub fn is_prose_or_data(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            let e = e.to_lowercase();
            PROSE_AND_DATA_EXTENSIONS.contains(&e.as_str())
        })
}

/// A loaded text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Repository-relative path.
    pub path: PathBuf,
    /// `path` rendered with `/` separators.
    pub display: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            display: display_path(&path),
            path,
            content: content.into(),
        }
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }

    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }
}

/// Reads scoped files in bounded batches.
#[derive(Debug, Clone, Copy)]
pub struct SourceLoader {
    batch_size: usize,
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SourceLoader {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Load every file in `files` that `wanted` accepts.
    ///
    /// Unreadable and non-UTF-8 files are skipped. Output order follows the
    /// file set.
    pub async fn load<F>(&self, gate: GateName, files: &FileSet, wanted: F) -> Vec<SourceFile>
    where
        F: Fn(&Path) -> bool,
    {
        let selected: Vec<&PathBuf> = files.iter().filter(|p| wanted(p.as_path())).collect();
        let batches = selected.len().div_ceil(self.batch_size);
        let mut loaded = Vec::with_capacity(selected.len());

        for (index, batch) in selected.chunks(self.batch_size).enumerate() {
            let reads = batch.iter().map(|rel| {
                let abs = files.absolute(rel);
                async move { (rel, tokio::fs::read(abs).await) }
            });

            for (rel, result) in join_all(reads).await {
                match result {
                    Ok(bytes) => match String::from_utf8(bytes) {
                        Ok(content) => loaded.push(SourceFile::new(rel.clone(), content)),
                        Err(_) => debug!(gate = %gate, file = %rel.display(), "Skipping non-UTF-8 file"),
                    },
                    Err(e) => {
                        debug!(gate = %gate, file = %rel.display(), error = %e, "Skipping unreadable file")
                    }
                }
            }

            debug!(gate = %gate, batch = index + 1, batches, "Loaded batch");
        }

        loaded
    }
}
