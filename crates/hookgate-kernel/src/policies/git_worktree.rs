//! Git operations that reach beyond the current worktree.
//!
//! Repository-wide commands (remotes, garbage collection, global config)
//! are refused. Deleting a worktree is allowed only right after the memory
//! bank was synced, so nothing learned inside it is lost.

use chrono::Duration;

use hookgate_types::{ActionKind, ActionRequest, LastSyncMarker};

use crate::config::{GateConfig, RuleAction};
use crate::patterns::PatternTable;
use crate::policy::{GateContext, Policy, PolicyVerdict};

pub struct GitWorktreeSafety {
    restricted: PatternTable,
    deletion: PatternTable,
}

impl GitWorktreeSafety {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            restricted: PatternTable::compile(&config.restricted_git, false),
            deletion: PatternTable::from_patterns(&config.sync.worktree_deletion, false),
        }
    }

    fn deletion_verdict(&self, ctx: &GateContext<'_>) -> PolicyVerdict {
        let max_age = ctx.config.sync_max_age();
        match ctx.records.read::<LastSyncMarker>() {
            Some(marker) if ctx.now - marker.timestamp < max_age => PolicyVerdict::Pass,
            Some(marker) => PolicyVerdict::block(
                format!(
                    "Worktree deletion requires a memory sync within the last {}; the last sync was {} ago",
                    human(max_age),
                    human(ctx.now - marker.timestamp)
                ),
                "Sync the memory bank, run `hookgate sync`, then retry the deletion.",
            ),
            None => PolicyVerdict::block(
                "Worktree deletion requires a memory sync first; no sync has been recorded",
                "Sync the memory bank, run `hookgate sync`, then retry the deletion.",
            ),
        }
    }
}

fn human(d: Duration) -> String {
    if d.num_hours() >= 1 {
        format!("{}h", d.num_hours())
    } else {
        format!("{}m", d.num_minutes().max(0))
    }
}

impl Policy for GitWorktreeSafety {
    fn name(&self) -> &'static str {
        "git_worktree_safety"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        request.action_kind == ActionKind::ShellCommand
    }

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        let Some(command) = request.shell_command() else {
            return PolicyVerdict::Pass;
        };
        match self.restricted.first_match(command) {
            Some(m) if m.action == RuleAction::Block => {
                return PolicyVerdict::block(
                    format!(
                        "`{}` is not allowed inside a worktree: it affects every worktree sharing the repository",
                        m.message
                    ),
                    "Run repository-wide git maintenance from the main checkout, or ask the operator.",
                );
            }
            Some(m) if m.action == RuleAction::Warn => {
                return PolicyVerdict::warn(format!("`{}` affects the whole repository", m.message));
            }
            Some(_) => return PolicyVerdict::Pass,
            None => {}
        }
        if self.deletion.is_match(command) {
            return self.deletion_verdict(ctx);
        }
        PolicyVerdict::Pass
    }
}
