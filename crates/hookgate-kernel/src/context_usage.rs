//! [`ContextTracker`] – rough accounting of how much of the agent's context
//! window the session has consumed.
//!
//! Tokens are estimated as characters divided by `chars_per_token`. Past
//! `warn_tokens` every post-action reply carries a reminder to persist state;
//! past `critical_tokens` it also carries a system directive.

use hookgate_store::{Records, StoreError};
use hookgate_types::{ActionOutcome, ActionRequest, ContextUsage, PostResponse};

use crate::config::GateConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextLevel {
    Normal,
    Warning,
    Critical,
}

pub struct ContextTracker<'c> {
    config: &'c GateConfig,
}

impl<'c> ContextTracker<'c> {
    pub fn new(config: &'c GateConfig) -> Self {
        Self { config }
    }

    pub fn level(&self, tokens: u64) -> ContextLevel {
        let c = &self.config.context;
        if tokens >= c.critical_tokens {
            ContextLevel::Critical
        } else if tokens >= c.warn_tokens {
            ContextLevel::Warning
        } else {
            ContextLevel::Normal
        }
    }

    pub fn estimate_tokens(&self, chars: usize) -> u64 {
        chars as u64 / self.config.context.chars_per_token.max(1)
    }

    /// Count one tool call. Runs for every parsed request, blocked or not.
    pub fn record_call(&self, records: &Records<'_>) -> Result<ContextUsage, StoreError> {
        records.update(ContextUsage::default, |u| u.tool_calls += 1)
    }

    /// Add the cost of a completed action and build the reply for the host.
    pub fn record_outcome(
        &self,
        records: &Records<'_>,
        request: &ActionRequest,
        outcome: &ActionOutcome,
    ) -> Result<PostResponse, StoreError> {
        let input_chars = serde_json::to_string(request).map_or(0, |s| s.len());
        let output_chars = outcome.output.as_deref().map_or(0, str::len);
        let added = self.estimate_tokens(input_chars + output_chars);

        let mut level = ContextLevel::Normal;
        let usage = records.update(ContextUsage::default, |u| {
            u.estimated_tokens += added;
            level = self.level(u.estimated_tokens);
            if level > ContextLevel::Normal {
                u.compaction_reminders += 1;
            }
        })?;
        Ok(self.response(level, usage.estimated_tokens))
    }

    /// After a compaction only the summary remains in context.
    pub fn record_compaction(&self, records: &Records<'_>) -> Result<ContextUsage, StoreError> {
        let baseline = self.config.context.compaction_baseline;
        records.update(ContextUsage::default, |u| u.estimated_tokens = baseline)
    }

    fn response(&self, level: ContextLevel, tokens: u64) -> PostResponse {
        let artifact = &self.config.recitation.artifact;
        match level {
            ContextLevel::Normal => PostResponse::default(),
            ContextLevel::Warning => PostResponse {
                message: Some(format!(
                    "Context usage: ~{tokens} tokens. Consider syncing memory soon to preserve state before hitting limits."
                )),
                system_directive: None,
            },
            ContextLevel::Critical => PostResponse {
                message: Some(format!(
                    "CRITICAL: Context limit approaching ({tokens} estimated tokens). \
                     Sync memory, summarize current state to `{artifact}`, and consider resetting the session."
                )),
                system_directive: Some(format!(
                    "<system-directive priority='high'>\n\
                     CONTEXT LIMIT REACHED. Before continuing:\n\
                     1. Sync important state to the memory bank\n\
                     2. Update {}/{artifact} with current progress\n\
                     3. Consider starting a new session\n\
                     </system-directive>",
                    self.config.control_dir
                )),
            },
        }
    }
}
