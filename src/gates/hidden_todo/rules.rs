//! Rule tables for the hidden-TODO detector.
//!
//! Every rule is data: an id, a regex, a signed weight and a category. The
//! detector sums the weights of the rules a group of lines matches, so tuning
//! happens here and nowhere else.

use anyhow::Context as _;
use regex::Regex;
use std::collections::HashMap;

use crate::language::{Language, LanguageProfile};

/// What a rule contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleCategory {
    /// Explicit incompleteness markers in comments.
    BroadKeyword,
    /// Phrases that describe unfinished work without saying TODO.
    DisguisedPhrase,
    /// Code shaped like a stub.
    StubSignature,
    /// Raises confidence: the surrounding text touches business logic.
    BusinessLogic,
    /// Lowers confidence sharply: the text talks about TODO tracking itself.
    TodoVocabulary,
}

impl RuleCategory {
    /// Finding rule id for categories that produce findings.
    pub fn finding_rule(&self) -> Option<&'static str> {
        match self {
            RuleCategory::BroadKeyword => Some("BROAD_KEYWORD"),
            RuleCategory::DisguisedPhrase => Some("DISGUISED_PHRASE"),
            RuleCategory::StubSignature => Some("STUB_SIGNATURE"),
            RuleCategory::BusinessLogic | RuleCategory::TodoVocabulary => None,
        }
    }

    pub fn is_signal(&self) -> bool {
        self.finding_rule().is_some()
    }
}

/// Where a rule is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Comment,
    Code,
    Both,
}

/// A rule definition.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub pattern: &'static str,
    pub weight: f64,
    pub category: RuleCategory,
    pub target: Target,
}

// ============================================================================
// Tables
// ============================================================================

pub const BROAD_KEYWORDS: &[Rule] = &[
    Rule {
        id: "keyword_todo",
        pattern: r"(?i:\b(todo|fixme|hack)\b)|\bXXX\b",
        weight: 0.6,
        category: RuleCategory::BroadKeyword,
        target: Target::Comment,
    },
    Rule {
        id: "keyword_stub",
        pattern: r"(?i)\bstub(s|bed)?\b",
        weight: 0.5,
        category: RuleCategory::BroadKeyword,
        target: Target::Comment,
    },
    Rule {
        id: "keyword_placeholder",
        pattern: r"(?i)\bplaceholders?\b",
        weight: 0.5,
        category: RuleCategory::BroadKeyword,
        target: Target::Comment,
    },
    Rule {
        id: "keyword_disabled",
        pattern: r"(?i)\b(temporarily\s+)?disabled\b",
        weight: 0.4,
        category: RuleCategory::BroadKeyword,
        target: Target::Comment,
    },
    Rule {
        id: "keyword_for_now",
        pattern: r"(?i)\bfor now\b",
        weight: 0.5,
        category: RuleCategory::BroadKeyword,
        target: Target::Comment,
    },
];

pub const DISGUISED_PHRASES: &[Rule] = &[
    Rule {
        id: "phrase_not_implemented",
        pattern: r"(?i)\bnot\s+(yet\s+)?implemented\b",
        weight: 0.7,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_to_be_implemented",
        pattern: r"(?i)\b(to|will)\s+be\s+(implemented|added|completed|wired up)\b",
        weight: 0.6,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_implement_later",
        pattern: r"(?i)\bimplement\s+(this|me|later|properly)\b",
        weight: 0.6,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_in_a_real",
        pattern: r"(?i)\bin\s+a\s+real\s+(implementation|system|app|application|world|scenario)\b",
        weight: 0.7,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_temporary",
        pattern: r"(?i)\btemporary\s+(solution|fix|workaround|implementation|hack|code)\b",
        weight: 0.6,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_simplified",
        pattern: r"(?i)\b(simplified|naive|basic)\s+(version|implementation|approach)\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_would_normally",
        pattern: r"(?i)\b(would|should)\s+(normally|typically|usually|eventually)\b",
        weight: 0.4,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_hardcoded",
        pattern: r"(?i)\bhard-?coded\s+(for\s+(now|testing|the demo)|until)\b",
        weight: 0.6,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_quick_fix",
        pattern: r"(?i)\b(quick|dirty)\s+(fix|hack)\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_fake_data",
        pattern: r"(?i)\b(fake|dummy|mock)\s+(data|implementation|response|value)s?\b",
        weight: 0.4,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_workaround_until",
        pattern: r"(?i)\bworkaround\s+until\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_not_handled_yet",
        pattern: r"(?i)\bnot\s+(handled|supported|wired|hooked up)\s+yet\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_coming_soon",
        pattern: r"(?i)\bcoming\s+soon\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
    Rule {
        id: "phrase_left_as_exercise",
        pattern: r"(?i)\bleft\s+as\s+an\s+exercise\b",
        weight: 0.5,
        category: RuleCategory::DisguisedPhrase,
        target: Target::Comment,
    },
];

pub const CONTEXT_RULES: &[Rule] = &[
    Rule {
        id: "context_business_logic",
        pattern: r"(?i)\b(auth\w*|login|logout|payments?|billing|invoices?|checkout|security|permissions?|validat\w*|database|transactions?|accounts?|passwords?|tokens?|encrypt\w*|decrypt\w*)\b",
        weight: 0.2,
        category: RuleCategory::BusinessLogic,
        target: Target::Both,
    },
    Rule {
        id: "context_todo_vocabulary",
        pattern: r"(?i)\btodo[ _-]?(list|item|app|system|tracker|detector|detection|scanner|pattern|comment|keyword|marker|template)s?\b|\bhidden[ _-]?todos?\b|\bbroad[ _-]keywords?\b",
        weight: -0.9,
        category: RuleCategory::TodoVocabulary,
        target: Target::Both,
    },
    Rule {
        id: "context_rule_definition",
        pattern: r"(?i)\b(pattern|keyword|phrase|marker)s?\s*[:=]|\bRegex::new\b|\bre\.compile\b|\bnew\s+RegExp\b",
        weight: -0.9,
        category: RuleCategory::TodoVocabulary,
        target: Target::Code,
    },
];

// ============================================================================
// Compiled Rules
// ============================================================================

/// A rule with its regex compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: &'static str,
    pub regex: Regex,
    pub weight: f64,
    pub category: RuleCategory,
    pub target: Target,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> anyhow::Result<Self> {
        Ok(Self {
            id: rule.id,
            regex: Regex::new(rule.pattern)
                .with_context(|| format!("Failed to compile rule '{}'", rule.id))?,
            weight: rule.weight,
            category: rule.category,
            target: rule.target,
        })
    }

    pub fn applies_to_comment(&self) -> bool {
        matches!(self.target, Target::Comment | Target::Both)
    }

    pub fn applies_to_code(&self) -> bool {
        matches!(self.target, Target::Code | Target::Both)
    }
}

/// All rules, compiled once per scan.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Keywords, phrases and context rules.
    text: Vec<CompiledRule>,
    /// Stub signatures per language (`None` is the generic profile).
    stubs: HashMap<Option<Language>, Vec<CompiledRule>>,
}

impl RuleSet {
    /// Compile every table.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern does not compile.
    pub fn compile() -> anyhow::Result<Self> {
        let text = BROAD_KEYWORDS
            .iter()
            .chain(DISGUISED_PHRASES)
            .chain(CONTEXT_RULES)
            .map(CompiledRule::compile)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut stubs = HashMap::new();
        let languages = Language::all().iter().copied().map(Some).chain([None]);
        for language in languages {
            let profile = LanguageProfile::for_language(language);
            let mut compiled = Vec::new();
            let own = profile.stub_patterns.iter();
            let shared = if language.is_some() {
                LanguageProfile::shared_stub_patterns()
            } else {
                &[]
            };
            for stub in own.chain(shared) {
                compiled.push(CompiledRule::compile(&Rule {
                    id: stub.id,
                    pattern: stub.pattern,
                    weight: stub.weight,
                    category: RuleCategory::StubSignature,
                    target: Target::Code,
                })?);
            }
            stubs.insert(language, compiled);
        }

        Ok(Self { text, stubs })
    }

    /// Rules applied to the text of every line.
    pub fn text_rules(&self) -> &[CompiledRule] {
        &self.text
    }

    /// Stub rules for a language.
    pub fn stub_rules(&self, language: Option<Language>) -> &[CompiledRule] {
        self.stubs.get(&language).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits<'a>(rules: &'a RuleSet, comment: &str) -> Vec<&'a str> {
        rules
            .text_rules()
            .iter()
            .filter(|r| r.applies_to_comment() && r.regex.is_match(comment))
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_all_tables_compile() {
        let rules = RuleSet::compile().unwrap();
        assert_eq!(
            rules.text_rules().len(),
            BROAD_KEYWORDS.len() + DISGUISED_PHRASES.len() + CONTEXT_RULES.len()
        );
        assert!(!rules.stub_rules(Some(Language::Rust)).is_empty());
        assert!(!rules.stub_rules(None).is_empty());
    }

    #[test]
    fn test_keyword_and_phrase_matching() {
        let rules = RuleSet::compile().unwrap();
        assert_eq!(hits(&rules, " TODO: implement auth"), vec!["keyword_todo", "context_business_logic"]);
        assert_eq!(hits(&rules, " return a fixed value for now"), vec!["keyword_for_now"]);
        assert_eq!(
            hits(&rules, " In a real system this would hit the cache"),
            vec!["phrase_in_a_real"]
        );
        assert!(hits(&rules, " Computes the todomvc total").is_empty());
        assert!(hits(&rules, " xxx is lowercase here").is_empty());
    }

    #[test]
    fn test_vocabulary_rules() {
        let rules = RuleSet::compile().unwrap();
        assert!(hits(&rules, " Parse a TODO comment into its parts").contains(&"context_todo_vocabulary"));
    }

    #[test]
    fn test_generic_profile_has_no_duplicate_shared_rules() {
        let rules = RuleSet::compile().unwrap();
        let generic: Vec<&str> = rules.stub_rules(None).iter().map(|r| r.id).collect();
        let mut deduped = generic.clone();
        deduped.dedup();
        assert_eq!(generic, deduped);
    }

    #[test]
    fn test_signal_categories() {
        assert!(RuleCategory::BroadKeyword.is_signal());
        assert!(!RuleCategory::BusinessLogic.is_signal());
        assert_eq!(RuleCategory::StubSignature.finding_rule(), Some("STUB_SIGNATURE"));
    }
}
