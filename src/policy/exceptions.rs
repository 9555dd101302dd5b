//! Exception (waiver) policy.
//!
//! The policy lives in `.qgate/exceptions.json` and is read fresh on every
//! run:
//!
//! ```json
//! {
//!   "exceptions": [
//!     {
//!       "id": "legacy-parser",
//!       "gate": "god_object",
//!       "matchRule": { "files": ["src/legacy/**"], "rules": ["GOD_OBJECT_CRITICAL"] },
//!       "reason": "Split scheduled for Q3",
//!       "approvedBy": "tech-lead",
//!       "expiresAt": "2026-12-31T00:00:00Z"
//!     }
//!   ]
//! }
//! ```
//!
//! An unreadable or malformed policy loads as the empty policy, which is the
//! strictest possible behaviour.

use std::path::Path;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{QgateError, Result};
use crate::gates::{Finding, GateName};

/// Gate value that matches every gate.
pub const ANY_GATE: &str = "*";

/// What an exception covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MatchRule {
    /// File globs; empty matches every file.
    pub files: Vec<String>,
    /// Rule identifiers (`Finding::rule`); empty matches every rule.
    pub rules: Vec<String>,
    /// Optional substring the finding message must contain.
    pub message_contains: Option<String>,
}

/// A justified, time-bounded waiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    #[serde(default)]
    pub id: Option<String>,
    /// Gate name or `*`.
    pub gate: String,
    #[serde(default)]
    pub match_rule: MatchRule,
    pub reason: String,
    pub approved_by: String,
    pub expires_at: DateTime<Utc>,
}

impl Exception {
    /// An expired exception never suppresses anything.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Short label for logs and notices.
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{} ({})", self.gate, self.reason))
    }
}

/// Audit record attached to a waived finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waiver {
    pub exception_id: Option<String>,
    pub reason: String,
    pub approved_by: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Exception> for Waiver {
    fn from(e: &Exception) -> Self {
        Self {
            exception_id: e.id.clone(),
            reason: e.reason.clone(),
            approved_by: e.approved_by.clone(),
            expires_at: e.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    exceptions: Vec<Exception>,
}

#[derive(Debug, Clone)]
struct CompiledException {
    exception: Exception,
    files: GlobSet,
}

impl CompiledException {
    fn compile(exception: Exception) -> std::result::Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &exception.match_rule.files {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            files: builder.build()?,
            exception,
        })
    }

    fn covers(&self, finding: &Finding) -> bool {
        let e = &self.exception;
        if e.gate != ANY_GATE && e.gate != finding.gate.as_str() {
            return false;
        }

        let rule = &e.match_rule;
        if !rule.rules.is_empty() && !rule.rules.iter().any(|r| r == &finding.rule) {
            return false;
        }
        if !rule.files.is_empty() && !self.files.is_match(&finding.file) {
            return false;
        }
        if let Some(ref needle) = rule.message_contains {
            if !finding.message.contains(needle.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A loaded exception policy.
#[derive(Debug, Clone, Default)]
pub struct ExceptionPolicy {
    exceptions: Vec<CompiledException>,
}

/// Result of loading a policy: the policy plus user-facing notices.
#[derive(Debug, Clone, Default)]
pub struct PolicyLoad {
    pub policy: ExceptionPolicy,
    pub notices: Vec<String>,
}

impl ExceptionPolicy {
    /// The empty policy.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a policy document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a required field is
    /// missing, or a file glob is invalid.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let file: PolicyFile = serde_json::from_str(content).map_err(|e| QgateError::Policy {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let exceptions = file
            .exceptions
            .into_iter()
            .map(CompiledException::compile)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| QgateError::Policy {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self { exceptions })
    }

    /// Load the policy at `path`, degrading to the empty policy on any
    /// failure.
    pub fn load(path: &Path, now: DateTime<Utc>) -> PolicyLoad {
        if !path.exists() {
            return PolicyLoad::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(QgateError::from)
            .and_then(|content| Self::parse(&content, path));

        match parsed {
            Ok(policy) => {
                let expired = policy.expired(now).map(|e| {
                    format!(
                        "Exception {} expired at {} and no longer applies",
                        e.label(),
                        e.expires_at.to_rfc3339()
                    )
                });
                let unknown = policy.unknown_gates().map(|e| {
                    format!(
                        "Exception {} names unknown gate '{}' and never applies (valid: {})",
                        e.label(),
                        e.gate,
                        GateName::valid_names().join(", ")
                    )
                });
                let notices = expired.chain(unknown).collect();
                PolicyLoad { policy, notices }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed exception policy, applying zero exceptions");
                PolicyLoad {
                    policy: Self::empty(),
                    notices: vec![format!(
                        "Exception policy could not be loaded ({}); no exceptions applied",
                        e
                    )],
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exceptions.is_empty()
    }

    /// Exceptions whose gate is neither `*` nor a known gate name.
    pub fn unknown_gates(&self) -> impl Iterator<Item = &Exception> {
        self.exceptions
            .iter()
            .map(|c| &c.exception)
            .filter(|e| e.gate != ANY_GATE && e.gate.parse::<GateName>().is_err())
    }

    /// Exceptions whose expiry has passed.
    pub fn expired(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Exception> {
        self.exceptions
            .iter()
            .map(|c| &c.exception)
            .filter(move |e| e.is_expired(now))
    }

    /// First live exception covering `finding`.
    pub fn find_waiver(&self, finding: &Finding, now: DateTime<Utc>) -> Option<&Exception> {
        self.exceptions
            .iter()
            .filter(|c| !c.exception.is_expired(now))
            .find(|c| c.covers(finding))
            .map(|c| &c.exception)
    }
}
