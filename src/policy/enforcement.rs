//! Enforcement levels and their per-gate, per-context resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ContextLevels;
use crate::context::Context;
use crate::gates::GateName;

/// How strictly a gate's findings are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementLevel {
    /// Findings are reported, the run proceeds.
    Warning,
    /// Findings fail the run.
    Fail,
    /// Findings fail the run; reserved for gates that must never be skipped.
    Block,
}

impl EnforcementLevel {
    /// Whether unwaived findings at this level become violations.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Fail | Self::Block)
    }
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Fail => write!(f, "fail"),
            Self::Block => write!(f, "block"),
        }
    }
}

/// Enforcement levels resolved once for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnforcementTable {
    context: Context,
    levels: BTreeMap<GateName, EnforcementLevel>,
}

impl EnforcementTable {
    /// Resolve every gate's level for `context`.
    ///
    /// A configured override wins; otherwise the context default applies.
    /// Override keys that are not gate names are ignored.
    pub fn resolve(context: Context, overrides: &BTreeMap<String, ContextLevels>) -> Self {
        let levels = GateName::ALL
            .iter()
            .map(|gate| {
                let level = overrides
                    .get(gate.as_str())
                    .and_then(|o| o.get(context))
                    .unwrap_or_else(|| context.default_enforcement());
                (*gate, level)
            })
            .collect();

        Self { context, levels }
    }

    pub fn context(&self) -> Context {
        self.context
    }

    /// Level for a gate.
    pub fn level(&self, gate: GateName) -> EnforcementLevel {
        self.levels
            .get(&gate)
            .copied()
            .unwrap_or_else(|| self.context.default_enforcement())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GateName, &EnforcementLevel)> {
        self.levels.iter()
    }
}
