//! Writes to secrets, lockfiles, VCS internals, and dependency trees are
//! refused outright, whatever the session looks like.

use hookgate_types::{ActionKind, ActionRequest};

use crate::classify;
use crate::config::{GateConfig, RuleAction};
use crate::patterns::PatternTable;
use crate::policy::{GateContext, Policy, PolicyVerdict};

pub struct FileRestriction {
    table: PatternTable,
    suggestion: String,
}

impl FileRestriction {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            table: PatternTable::compile(&config.restricted_files, false),
            suggestion: config.restricted_file_suggestion.clone(),
        }
    }
}

fn is_env_file(path: &str) -> bool {
    let name = classify::file_name(path);
    (name == ".env" || name.starts_with(".env.")) && !name.ends_with(".template")
}

impl Policy for FileRestriction {
    fn name(&self) -> &'static str {
        "file_restriction"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        matches!(request.action_kind, ActionKind::FileWrite | ActionKind::FileRead)
            && request.path().is_some()
    }

    fn evaluate(&self, request: &ActionRequest, _ctx: &GateContext<'_>) -> PolicyVerdict {
        let Some(path) = request.path() else {
            return PolicyVerdict::Pass;
        };
        if request.is_read() {
            if is_env_file(path) {
                return PolicyVerdict::warn(format!(
                    "Reading environment file {path}. Never echo, log, or commit the secret values it contains."
                ));
            }
            return PolicyVerdict::Pass;
        }

        let normalized = path.replace('\\', "/");
        match self.table.first_match(&normalized) {
            Some(m) if m.action == RuleAction::Block => PolicyVerdict::Block {
                reason: format!("Cannot modify restricted file: {path} ({})", m.message),
                suggestion: Some(self.suggestion.clone()),
            },
            Some(m) if m.action == RuleAction::Warn => {
                PolicyVerdict::warn(format!("Modifying sensitive file {path} ({})", m.message))
            }
            _ => PolicyVerdict::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::testing::Fixture;

    fn verdict_for(request: ActionRequest) -> PolicyVerdict {
        let fx = Fixture::new();
        FileRestriction::new(&fx.config).evaluate(&request, &fx.ctx())
    }

    #[test]
    fn env_files_are_blocked_with_template_suggestion() {
        let PolicyVerdict::Block { reason, suggestion } =
            verdict_for(ActionRequest::file_write("worktrees/feat/.env"))
        else {
            panic!("expected block");
        };
        assert!(reason.contains(".env"));
        assert!(reason.contains("environment file"));
        assert!(suggestion.unwrap().contains("shared-config/.env.template"));
    }

    #[test]
    fn every_default_category_blocks() {
        for path in [
            ".env.local",
            ".git/config",
            "repo/.bare/HEAD",
            "package-lock.json",
            "yarn.lock",
            "pnpm-lock.yaml",
            "composer.lock",
            "Gemfile.lock",
            "/home/u/.aws/credentials",
            "/home/u/.ssh/id_ed25519",
            "/home/u/.gnupg/pubring.kbx",
            "node_modules/left-pad/index.js",
            r"C:\repo\.git\HEAD",
        ] {
            assert!(
                matches!(verdict_for(ActionRequest::file_write(path)), PolicyVerdict::Block { .. }),
                "{path} should be blocked"
            );
        }
    }

    #[test]
    fn env_template_stays_editable() {
        assert_eq!(
            verdict_for(ActionRequest::file_write("shared-config/.env.template")),
            PolicyVerdict::Pass
        );
        assert_eq!(verdict_for(ActionRequest::file_write("src/main.rs")), PolicyVerdict::Pass);
    }

    #[test]
    fn reading_env_file_warns_but_template_does_not() {
        assert!(matches!(
            verdict_for(ActionRequest::file_read(".env")),
            PolicyVerdict::Warn { .. }
        ));
        assert_eq!(
            verdict_for(ActionRequest::file_read("shared-config/.env.template")),
            PolicyVerdict::Pass
        );
    }

    #[test]
    fn operator_warn_rules_only_warn() {
        let mut fx = Fixture::new();
        fx.config.restricted_files.insert(
            0,
            crate::config::PatternRule {
                pattern: r"Cargo\.lock$".into(),
                action: RuleAction::Warn,
                message: "lockfile".into(),
            },
        );
        let policy = FileRestriction::new(&fx.config);
        assert!(matches!(
            policy.evaluate(&ActionRequest::file_write("Cargo.lock"), &fx.ctx()),
            PolicyVerdict::Warn { .. }
        ));
    }
}
