//! Periodic restatement of goals into the active-context document.
//!
//! Every significant action (a write outside the control directory, a
//! commit, a test run) bumps `actions_since_recitation` by one. Writing the
//! recitation artifact resets it. Past the thresholds the agent is nagged,
//! then nagged loudly; the action itself is never refused.

use hookgate_store::StoreError;
use hookgate_types::{ActionKind, ActionRequest, RecitationEntry, RecitationLog, Severity};
use tracing::debug;

use crate::classify;
use crate::config::GateConfig;
use crate::policy::{GateContext, Policy, PolicyVerdict};

use super::tdd::TestDrivenDevelopment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecitationLevel {
    Ok,
    Warn,
    Block,
}

impl RecitationLevel {
    pub fn for_count(count: u64, config: &GateConfig) -> Self {
        if count >= config.recitation.block_at {
            RecitationLevel::Block
        } else if count >= config.recitation.warn_at {
            RecitationLevel::Warn
        } else {
            RecitationLevel::Ok
        }
    }
}

pub struct RecitationLoop {
    tdd: TestDrivenDevelopment,
    artifact: String,
    control_dir: String,
}

impl RecitationLoop {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            tdd: TestDrivenDevelopment::new(config),
            artifact: config.recitation.artifact.clone(),
            control_dir: config.control_dir.clone(),
        }
    }

    fn is_recitation(&self, request: &ActionRequest) -> bool {
        request.is_write()
            && request
                .path()
                .is_some_and(|p| classify::file_name(p) == self.artifact)
    }

    /// The kind and description of a significant action, if `request` is one.
    fn significance<'r>(&self, request: &'r ActionRequest) -> Option<(&'static str, &'r str)> {
        match request.action_kind {
            ActionKind::FileWrite => request
                .path()
                .filter(|p| !classify::is_under_control_dir(p, &self.control_dir))
                .map(|p| ("file_write", p)),
            ActionKind::ShellCommand => {
                let command = request.shell_command()?;
                if classify::is_commit(command) {
                    Some(("commit", command))
                } else if self.tdd.is_test_run(command) {
                    Some(("test_run", command))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl Policy for RecitationLoop {
    fn name(&self) -> &'static str {
        "recitation_loop"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        self.is_recitation(request) || self.significance(request).is_some()
    }

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        if self.is_recitation(request) {
            return PolicyVerdict::Pass;
        }
        let count = ctx.session().actions_since_recitation;
        match RecitationLevel::for_count(count, ctx.config) {
            RecitationLevel::Ok => PolicyVerdict::Pass,
            RecitationLevel::Warn => PolicyVerdict::warn(format!(
                "{count} significant actions since the last recitation. Restate current goals and progress in {} soon.",
                self.artifact
            )),
            RecitationLevel::Block => PolicyVerdict::Warn {
                message: format!(
                    "RECITATION OVERDUE: {count} significant actions without updating {}. \
                     Stop and restate the current goal, progress, and next steps there before continuing.",
                    self.artifact
                ),
                severity: Severity::Error,
            },
        }
    }

    fn observe(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> Result<(), StoreError> {
        let cap = ctx.config.recitation.log_cap;
        if self.is_recitation(request) {
            let session = ctx.update_session(|s| {
                s.actions_since_recitation = 0;
                s.last_recitation = Some(ctx.now);
            })?;
            debug!(session_id = %session.session_id, "recitation recorded");
            return Ok(());
        }
        let Some((kind, description)) = self.significance(request) else {
            return Ok(());
        };
        let session = ctx.update_session(|s| {
            s.significant_actions += 1;
            s.actions_since_recitation += 1;
        })?;
        ctx.records.update(RecitationLog::default, |log| {
            log.push(
                RecitationEntry {
                    timestamp: ctx.now,
                    kind: kind.to_string(),
                    description: description.to_string(),
                    actions_since_recitation: session.actions_since_recitation,
                },
                cap,
            );
        })?;
        debug!(kind, count = session.actions_since_recitation, "significant action counted");
        Ok(())
    }
}
