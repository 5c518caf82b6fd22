//! Destructive or remote-code shell commands. Pure: no state is consulted.

use hookgate_types::{ActionKind, ActionRequest};
use tracing::debug;

use crate::config::{GateConfig, RuleAction};
use crate::patterns::PatternTable;
use crate::policy::{GateContext, Policy, PolicyVerdict};

pub struct DangerousCommand {
    table: PatternTable,
}

impl DangerousCommand {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            table: PatternTable::compile(&config.dangerous_commands, true),
        }
    }
}

impl Policy for DangerousCommand {
    fn name(&self) -> &'static str {
        "dangerous_command"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        request.action_kind == ActionKind::ShellCommand
    }

    fn evaluate(&self, request: &ActionRequest, _ctx: &GateContext<'_>) -> PolicyVerdict {
        let Some(command) = request.shell_command() else {
            return PolicyVerdict::Pass;
        };
        match self.table.first_match(command) {
            Some(m) if m.action == RuleAction::Block => {
                debug!(matched = m.matched, "dangerous command pattern matched");
                PolicyVerdict::block(
                    format!("SAFETY INTERVENTION: {}", m.message),
                    "Use a narrower, reversible command, or ask the operator to run it manually.",
                )
            }
            Some(m) if m.action == RuleAction::Warn => PolicyVerdict::warn(format!(
                "Potentially dangerous command (`{}`): {}",
                m.matched, m.message
            )),
            _ => PolicyVerdict::Pass,
        }
    }
}
