//! Testing infrastructure for qgate.
//!
//! - **Mocks**: test doubles for the git seam
//! - **Fixtures**: temporary project trees (test-only)

#[cfg(test)]
pub mod fixtures;
pub mod mocks;

#[cfg(test)]
pub use fixtures::*;
pub use mocks::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::GitOperations;

    #[test]
    fn test_mock_git_defaults() {
        let git = MockGitOperations::default();
        assert!(git.is_available());
        assert!(git.staged_files().unwrap().is_empty());
        assert!(git.push_range_files(None).unwrap().is_empty());
    }

    #[test]
    fn test_mock_git_failing_push_range() {
        let git = MockGitOperations::new().with_failing_push_range();
        assert!(git.push_range_files(Some("origin/main")).is_err());
    }

    #[test]
    fn test_fixture_file_set_tracks_writes() {
        let project = TestProject::new()
            .with_file("src/a.rs", "fn a() {}\n")
            .with_lines("src/big.rs", 10);
        let set = project.file_set();
        assert_eq!(set.len(), 2);
        let content = std::fs::read_to_string(project.path().join("src/big.rs")).unwrap();
        assert_eq!(content.lines().count(), 10);
    }
}
