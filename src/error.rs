//! Custom error types for qgate.
//!
//! Only system-level failures are errors. Violations found by a gate are
//! ordinary data and travel in the run report, never through this type.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a run that completed with zero violations.
pub const EXIT_OK: i32 = 0;

/// Exit code for a run that completed with at least one violation.
pub const EXIT_VIOLATIONS: i32 = 1;

/// Reserved exit code for a failure to run at all.
pub const EXIT_SYSTEM_FAILURE: i32 = 2;

/// Main error type for qgate operations
#[derive(Error, Debug)]
pub enum QgateError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A gate name outside the closed gate set was requested
    #[error("Unknown gate '{name}'. Valid gates: {}", valid.join(", "))]
    UnknownGate { name: String, valid: Vec<String> },

    // =========================================================================
    // Scope / Policy Errors
    // =========================================================================
    /// Git operation failed
    #[error("Git operation failed: {operation} - {message}")]
    Git { operation: String, message: String },

    /// Exception policy could not be loaded
    #[error("Exception policy error in {path}: {message}")]
    Policy { path: PathBuf, message: String },

    // =========================================================================
    // Locking Errors
    // =========================================================================
    /// Another live invocation holds the run lock
    #[error(
        "Another qgate run (pid {pid}) has held the lock since {since}. \
         Wait for it to finish, re-run with --force to bypass the lock, \
         or remove it with `qgate lock clear` if that process is gone"
    )]
    LockHeld { pid: u32, since: String },

    /// Lock file could not be read or written
    #[error("Run lock error: {message}")]
    Lock { message: String },

    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Report artifact could not be written
    #[error("Failed to write report to {path}: {message}")]
    Report { path: PathBuf, message: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QgateError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Create a git error
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a lock error
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    /// Create a report error
    pub fn report(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Report {
            path: path.into(),
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error is recovered locally instead of aborting the run.
    ///
    /// Scope and policy failures degrade (full-tree fallback, zero exceptions);
    /// everything else stops the invocation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Git { .. } | Self::Policy { .. } | Self::Config { .. } | Self::Toml(_)
        )
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        EXIT_SYSTEM_FAILURE
    }
}

/// Type alias for qgate results
pub type Result<T> = std::result::Result<T, QgateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_gate_lists_valid_set() {
        let err = QgateError::UnknownGate {
            name: "bogus_gate".to_string(),
            valid: vec!["naming".to_string(), "duplication".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("bogus_gate"));
        assert!(msg.contains("naming, duplication"));
    }

    #[test]
    fn test_lock_held_is_actionable() {
        let err = QgateError::LockHeld {
            pid: 4242,
            since: "2026-01-01T00:00:00Z".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4242"));
        assert!(msg.contains("--force"));
        assert!(msg.contains("qgate lock clear"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(QgateError::git("diff", "not a repo").is_recoverable());
        assert!(QgateError::config("bad").is_recoverable());
        assert!(!QgateError::lock("io").is_recoverable());
        assert!(!QgateError::LockHeld {
            pid: 1,
            since: String::new()
        }
        .is_recoverable());
    }

    #[test]
    fn test_every_error_is_a_system_failure() {
        assert_eq!(QgateError::lock("x").exit_code(), EXIT_SYSTEM_FAILURE);
        assert_eq!(
            QgateError::report("r.json", "denied").exit_code(),
            EXIT_SYSTEM_FAILURE
        );
    }
}
