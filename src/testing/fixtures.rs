//! Test fixtures for creating reproducible project trees.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::scope::FileSet;

/// A temporary project directory.
///
/// Automatically cleans up when dropped.
pub struct TestProject {
    temp_dir: TempDir,
    written: Vec<PathBuf>,
}

impl TestProject {
    /// Create an empty project.
    ///
    /// # Panics
    ///
    /// Panics if temporary directory creation fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            written: Vec::new(),
        }
    }

    /// Write a file relative to the project root, creating parents.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    #[must_use]
    pub fn with_file(mut self, relative: &str, content: &str) -> Self {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write fixture file");
        self.written.push(PathBuf::from(relative));
        self
    }

    /// Write a file of `lines` numbered lines.
    #[must_use]
    pub fn with_lines(self, relative: &str, lines: usize) -> Self {
        let content: String = (0..lines).map(|i| format!("let v{} = {};\n", i, i)).collect();
        self.with_file(relative, &content)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// File set over every file written so far.
    pub fn file_set(&self) -> FileSet {
        FileSet::new(self.path(), self.written.clone())
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
