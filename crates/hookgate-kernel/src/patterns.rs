//! [`PatternTable`] – ordered regex rules compiled once per invocation.
//!
//! A rule whose pattern does not compile is skipped with a warning; the rest
//! of the table still applies.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::config::{PatternRule, RuleAction};

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    action: RuleAction,
    message: String,
}

/// The rule that matched a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch<'t> {
    pub action: RuleAction,
    pub message: &'t str,
    /// The literal text the pattern matched.
    pub matched: &'t str,
}

#[derive(Debug, Default)]
pub struct PatternTable {
    rules: Vec<CompiledRule>,
}

impl PatternTable {
    pub fn compile(rules: &[PatternRule], case_insensitive: bool) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| {
                match RegexBuilder::new(&rule.pattern)
                    .case_insensitive(case_insensitive)
                    .build()
                {
                    Ok(regex) => Some(CompiledRule {
                        regex,
                        action: rule.action,
                        message: rule.message.clone(),
                    }),
                    Err(e) => {
                        warn!(pattern = %rule.pattern, error = %e, "skipping invalid pattern rule");
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    /// Compile bare patterns that all share `action` and carry no message.
    pub fn from_patterns(patterns: &[String], case_insensitive: bool) -> Self {
        let rules: Vec<PatternRule> = patterns
            .iter()
            .map(|p| PatternRule {
                pattern: p.clone(),
                action: RuleAction::Block,
                message: String::new(),
            })
            .collect();
        Self::compile(&rules, case_insensitive)
    }

    /// The first rule matching `subject`, in table order.
    pub fn first_match<'t>(&'t self, subject: &'t str) -> Option<PatternMatch<'t>> {
        self.rules.iter().find_map(|rule| {
            rule.regex.find(subject).map(|m| PatternMatch {
                action: rule.action,
                message: &rule.message,
                matched: m.as_str(),
            })
        })
    }

    pub fn is_match(&self, subject: &str) -> bool {
        self.rules.iter().any(|rule| rule.regex.is_match(subject))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
