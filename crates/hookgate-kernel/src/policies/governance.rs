//! Feature lifecycle discipline: PRD, then epic decomposition, then code.
//!
//! Advisory only. The phase is derived from what exists on disk under the
//! control directory every time; the governance record is a log of what was
//! observed, never an input.

use std::fs;
use std::path::Path;

use hookgate_store::StoreError;
use hookgate_types::{ActionKind, ActionRequest, FeatureGovernanceState, Phase, Severity};
use tracing::debug;

use crate::classify;
use crate::policy::{GateContext, Policy, PolicyVerdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureProgress {
    pub phase: Phase,
    pub prd_exists: bool,
    pub epic_exists: bool,
}

#[derive(Default)]
pub struct FeatureGovernance;

impl FeatureGovernance {
    pub fn new() -> Self {
        Self
    }

    fn feature<'r>(&self, request: &'r ActionRequest, ctx: &GateContext<'_>) -> Option<&'r str> {
        let path = request.path()?;
        if !classify::is_implementation_file(path) {
            return None;
        }
        classify::feature_name(path, &ctx.config.governance.feature_marker)
    }

    /// Where `feature` stands, judged from the PRD and epic directories.
    pub fn progress(feature: &str, ctx: &GateContext<'_>) -> FeatureProgress {
        let key = classify::normalize_feature(feature);
        let prd_exists = has_prd(&ctx.control_path(&ctx.config.governance.prd_dir), &key);
        let epic_exists = has_epic_tasks(&ctx.control_path(&ctx.config.governance.epic_dir), &key);
        let phase = match (prd_exists, epic_exists) {
            (false, _) => Phase::Brainstorm,
            (true, false) => Phase::Plan,
            (true, true) => Phase::Execute,
        };
        FeatureProgress {
            phase,
            prd_exists,
            epic_exists,
        }
    }
}

fn is_markdown(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

/// `<prds>/<feature>.md`, compared by normalized stem.
fn has_prd(prd_dir: &Path, key: &str) -> bool {
    let Ok(entries) = fs::read_dir(prd_dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        is_markdown(&name)
            && entry.path().is_file()
            && name
                .rsplit_once('.')
                .is_some_and(|(stem, _)| classify::normalize_feature(stem) == key)
    })
}

/// `<epics>/<feature>/` holding at least one task file other than README.md.
fn has_epic_tasks(epic_dir: &Path, key: &str) -> bool {
    let Ok(entries) = fs::read_dir(epic_dir) else {
        return false;
    };
    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter(|entry| classify::normalize_feature(&entry.file_name().to_string_lossy()) == key)
        .any(|entry| {
            fs::read_dir(entry.path()).is_ok_and(|tasks| {
                tasks.flatten().any(|task| {
                    let name = task.file_name();
                    let name = name.to_string_lossy();
                    is_markdown(&name) && !name.eq_ignore_ascii_case("README.md")
                })
            })
        })
}

impl Policy for FeatureGovernance {
    fn name(&self) -> &'static str {
        "feature_governance"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        request.action_kind == ActionKind::FileWrite && request.path().is_some()
    }

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        let Some(feature) = self.feature(request, ctx) else {
            return PolicyVerdict::Pass;
        };
        let governance = &ctx.config.governance;
        match Self::progress(feature, ctx).phase {
            Phase::Brainstorm => PolicyVerdict::warn(format!(
                "Feature '{feature}' has no PRD. Create PRD first: {}/{}/{feature}.md",
                ctx.config.control_dir, governance.prd_dir
            )),
            Phase::Plan => PolicyVerdict::Warn {
                message: format!(
                    "Feature '{feature}' has a PRD but no epic tasks yet. Consider decomposing it under {}/{}/{feature}/",
                    ctx.config.control_dir, governance.epic_dir
                ),
                severity: Severity::Info,
            },
            _ => PolicyVerdict::Pass,
        }
    }

    fn observe(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> Result<(), StoreError> {
        let Some(feature) = self.feature(request, ctx) else {
            return Ok(());
        };
        let progress = Self::progress(feature, ctx);
        ctx.records.update(FeatureGovernanceState::default, |g| {
            g.upsert(
                feature,
                progress.phase,
                progress.prd_exists,
                progress.epic_exists,
                ctx.now,
            );
        })?;
        debug!(feature, phase = %progress.phase, "feature activity recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::testing::{Fixture, t0};

    const WRITE: &str = "src/feature/user-auth/login.ts";

    fn verdict(fx: &Fixture) -> PolicyVerdict {
        FeatureGovernance::new().evaluate(&ActionRequest::file_write(WRITE), &fx.ctx())
    }

    #[test]
    fn missing_prd_warns_create_prd_first() {
        let fx = Fixture::new();
        let PolicyVerdict::Warn { message, severity } = verdict(&fx) else {
            panic!("expected warning");
        };
        assert!(message.contains("Create PRD first"));
        assert_eq!(severity, Severity::Warning);
    }

    #[test]
    fn prd_without_tasks_is_plan_phase() {
        let fx = Fixture::new();
        fx.write(".claude/prds/user_auth.md", "# PRD");
        fx.write(".claude/epics/user-auth/README.md", "overview only");
        let PolicyVerdict::Warn { severity, .. } = verdict(&fx) else {
            panic!("expected soft warning");
        };
        assert_eq!(severity, Severity::Info);
    }

    #[test]
    fn prd_and_tasks_means_execute() {
        let fx = Fixture::new();
        fx.write(".claude/prds/User-Auth.md", "# PRD");
        fx.write(".claude/epics/userauth/001-login.md", "task");
        assert_eq!(verdict(&fx), PolicyVerdict::Pass);
    }

    #[test]
    fn non_implementation_files_are_ignored() {
        let fx = Fixture::new();
        let policy = FeatureGovernance::new();
        for path in [
            "src/feature/user-auth/README.md",
            "src/feature/user-auth/login.test.ts",
            "src/feature/login.ts",
            "src/auth/login.ts",
        ] {
            assert_eq!(
                policy.evaluate(&ActionRequest::file_write(path), &fx.ctx()),
                PolicyVerdict::Pass,
                "{path}"
            );
        }
    }

    #[test]
    fn observe_records_feature_and_keeps_start() {
        let fx = Fixture::new();
        let policy = FeatureGovernance::new();
        policy.observe(&ActionRequest::file_write(WRITE), &fx.ctx_at(t0())).unwrap();
        fx.write(".claude/prds/user-auth.md", "# PRD");
        let later = t0() + chrono::Duration::hours(2);
        policy.observe(&ActionRequest::file_write(WRITE), &fx.ctx_at(later)).unwrap();

        let g: FeatureGovernanceState = fx.records().read().unwrap();
        let rec = &g.features["user-auth"];
        assert_eq!(rec.phase, Phase::Plan);
        assert!(rec.prd_exists);
        assert_eq!(rec.started, t0());
        assert_eq!(g.current_feature.as_deref(), Some("user-auth"));
    }
}
