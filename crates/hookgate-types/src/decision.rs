//! The engine's answer for one [`ActionRequest`][crate::ActionRequest].

use serde::{Deserialize, Serialize};

/// Terminal outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Block,
}

/// Final decision: exactly one verdict, optional rationale, and any warnings
/// gathered before the verdict was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: None,
            suggestion: None,
            warnings: Vec::new(),
        }
    }

    pub fn block(reason: impl Into<String>, suggestion: Option<String>) -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Some(reason.into()),
            suggestion,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::allow()
    }
}
