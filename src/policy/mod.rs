//! Exception/waiver framework.
//!
//! Turns raw detector [`Finding`]s into exactly one of two outcomes:
//!
//! - **Violation**: blocks the run
//! - **Warning**: reported, the run proceeds
//!
//! The rules, in order:
//!
//! 1. A live (non-expired) exception covering the finding makes it a Warning
//!    and attaches the waiver for audit.
//! 2. A finding the detector marked advisory (`info` or `warning` severity)
//!    is a Warning.
//! 3. Otherwise the gate's resolved [`EnforcementLevel`] decides: `warning`
//!    gives a Warning, `fail` and `block` give a Violation.

pub mod enforcement;
pub mod exceptions;

pub use enforcement::{EnforcementLevel, EnforcementTable};
pub use exceptions::{Exception, ExceptionPolicy, MatchRule, PolicyLoad, Waiver, ANY_GATE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gates::{Finding, FindingSeverity};

/// Outcome of classifying one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Violation,
    Warning,
}

/// A finding after policy resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedFinding {
    #[serde(flatten)]
    pub finding: Finding,
    /// Enforcement level in effect for the finding's gate.
    pub level: EnforcementLevel,
    /// Present when an exception downgraded the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiver: Option<Waiver>,
}

/// Findings split by disposition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub violations: Vec<ClassifiedFinding>,
    pub warnings: Vec<ClassifiedFinding>,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.violations.len() + self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absorb another classification.
    pub fn extend(&mut self, other: Classification) {
        self.violations.extend(other.violations);
        self.warnings.extend(other.warnings);
    }
}

/// Classify a single finding.
pub fn classify_one(
    finding: Finding,
    level: EnforcementLevel,
    policy: &ExceptionPolicy,
    now: DateTime<Utc>,
) -> (Disposition, ClassifiedFinding) {
    if let Some(exception) = policy.find_waiver(&finding, now) {
        let waiver = Waiver::from(exception);
        return (
            Disposition::Warning,
            ClassifiedFinding {
                finding,
                level,
                waiver: Some(waiver),
            },
        );
    }

    let advisory = matches!(
        finding.severity,
        Some(FindingSeverity::Info | FindingSeverity::Warning)
    );
    let disposition = if !advisory && level.is_blocking() {
        Disposition::Violation
    } else {
        Disposition::Warning
    };

    (
        disposition,
        ClassifiedFinding {
            finding,
            level,
            waiver: None,
        },
    )
}

/// Classify every finding of one gate.
///
/// Each input finding lands in exactly one of the two output lists.
pub fn classify(
    findings: Vec<Finding>,
    level: EnforcementLevel,
    policy: &ExceptionPolicy,
    now: DateTime<Utc>,
) -> Classification {
    let mut out = Classification::default();
    for finding in findings {
        match classify_one(finding, level, policy, now) {
            (Disposition::Violation, c) => out.violations.push(c),
            (Disposition::Warning, c) => out.warnings.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::GateName;
    use chrono::Duration;
    use std::path::Path;

    fn policy_with(expires_at: DateTime<Utc>) -> ExceptionPolicy {
        let json = format!(
            r#"{{"exceptions":[{{"id":"w1","gate":"hidden_todo","matchRule":{{"files":["src/auth/**"]}},"reason":"tracked in JIRA-12","approvedBy":"lead","expiresAt":"{}"}}]}}"#,
            expires_at.to_rfc3339()
        );
        ExceptionPolicy::parse(&json, Path::new("exceptions.json")).unwrap()
    }

    fn findings() -> Vec<Finding> {
        vec![
            Finding::new(GateName::HiddenTodo, "BROAD_KEYWORD", "TODO", "src/auth/login.rs"),
            Finding::new(GateName::HiddenTodo, "BROAD_KEYWORD", "TODO", "src/api.rs"),
            Finding::new(GateName::HiddenTodo, "DISGUISED_PHRASE", "for now", "src/api.rs")
                .with_severity(FindingSeverity::Warning),
            Finding::new(GateName::HiddenTodo, "STUB_SIGNATURE", "todo!()", "src/db.rs")
                .with_severity(FindingSeverity::Info),
        ]
    }

    #[test]
    fn test_classification_is_total() {
        let now = Utc::now();
        let policy = policy_with(now + Duration::days(1));
        for level in [
            EnforcementLevel::Warning,
            EnforcementLevel::Fail,
            EnforcementLevel::Block,
        ] {
            let input = findings();
            let total = input.len();
            let result = classify(input, level, &policy, now);
            assert_eq!(result.len(), total);
        }
    }

    #[test]
    fn test_live_exception_downgrades_and_attaches_waiver() {
        let now = Utc::now();
        let policy = policy_with(now + Duration::days(1));
        let result = classify(findings(), EnforcementLevel::Block, &policy, now);

        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].finding.file, "src/api.rs");

        let waived: Vec<_> = result.warnings.iter().filter(|w| w.waiver.is_some()).collect();
        assert_eq!(waived.len(), 1);
        assert_eq!(waived[0].finding.file, "src/auth/login.rs");
        assert_eq!(
            waived[0].waiver.as_ref().map(|w| w.reason.as_str()),
            Some("tracked in JIRA-12")
        );
    }

    #[test]
    fn test_expired_exception_behaves_like_none() {
        let now = Utc::now();
        let expired = classify(
            findings(),
            EnforcementLevel::Block,
            &policy_with(now - Duration::seconds(1)),
            now,
        );
        let none = classify(
            findings(),
            EnforcementLevel::Block,
            &ExceptionPolicy::empty(),
            now,
        );
        assert_eq!(expired, none);
        assert_eq!(expired.violations.len(), 2);
    }

    #[test]
    fn test_warning_level_never_violates() {
        let now = Utc::now();
        let result = classify(
            findings(),
            EnforcementLevel::Warning,
            &ExceptionPolicy::empty(),
            now,
        );
        assert!(result.violations.is_empty());
        assert_eq!(result.warnings.len(), 4);
    }

    #[test]
    fn test_classified_finding_serializes_flat() {
        let now = Utc::now();
        let (_, c) = classify_one(
            Finding::new(GateName::Naming, "BANNED_MODIFIER_FILENAME", "m", "a_new.rs"),
            EnforcementLevel::Fail,
            &ExceptionPolicy::empty(),
            now,
        );
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["type"], "BANNED_MODIFIER_FILENAME");
        assert_eq!(value["gate"], "naming");
        assert_eq!(value["level"], "fail");
        assert!(value.get("waiver").is_none());
    }
}
