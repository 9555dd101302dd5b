//! Invocation context: the scenario a run is gating.
//!
//! The context decides how wide the file scope is and how strict the default
//! enforcement is. It is fixed for the lifetime of one invocation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::policy::EnforcementLevel;

/// Environment variable whose presence marks a continuous-integration run.
pub const CI_ENV_VAR: &str = "CI";

/// Invocation scenario.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// Pre-commit: only staged files.
    Commit,
    /// Pre-push: files changed in the range about to be pushed.
    Push,
    /// Continuous integration: the whole tracked tree.
    Ci,
}

impl Context {
    /// All contexts in canonical order.
    pub const ALL: [Context; 3] = [Context::Commit, Context::Push, Context::Ci];

    /// Infer the context when none was given explicitly.
    ///
    /// A CI indicator wins; otherwise `push` when the push flag is set and
    /// `commit` by default.
    #[must_use]
    pub fn infer(ci_indicator: Option<&str>, push_flag: bool) -> Self {
        let in_ci = ci_indicator
            .map(|v| {
                let v = v.trim();
                !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
            })
            .unwrap_or(false);

        if in_ci {
            Context::Ci
        } else if push_flag {
            Context::Push
        } else {
            Context::Commit
        }
    }

    /// Infer from the process environment.
    #[must_use]
    pub fn from_env(push_flag: bool) -> Self {
        let ci = std::env::var(CI_ENV_VAR).ok();
        Self::infer(ci.as_deref(), push_flag)
    }

    /// Default enforcement level for gates in this context.
    ///
    /// Local commits only warn, pushes fail, CI blocks.
    #[must_use]
    pub fn default_enforcement(&self) -> EnforcementLevel {
        match self {
            Context::Commit => EnforcementLevel::Warning,
            Context::Push => EnforcementLevel::Fail,
            Context::Ci => EnforcementLevel::Block,
        }
    }

    /// Lowercase identifier used in config keys and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Commit => "commit",
            Context::Push => "push",
            Context::Ci => "ci",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commit" => Ok(Context::Commit),
            "push" => Ok(Context::Push),
            "ci" => Ok(Context::Ci),
            other => Err(format!(
                "unknown context '{}': expected commit, push or ci",
                other
            )),
        }
    }
}
