//! Commits require a recent, passing test run.
//!
//! The run is recorded after the fact, from the exit status the host reports
//! for a test-runner command. Seeing the command before it runs proves
//! nothing, so pre-action evaluation never writes state.

use hookgate_store::StoreError;
use hookgate_types::{ActionKind, ActionOutcome, ActionRequest, TestRunState};
use tracing::info;

use crate::classify;
use crate::config::GateConfig;
use crate::patterns::PatternTable;
use crate::policy::{GateContext, Policy, PolicyVerdict};

const SUGGESTION: &str =
    "Run the test suite (e.g. `cargo test`, `npm test`, `pytest`) and commit once it passes.";

pub struct TestDrivenDevelopment {
    runners: PatternTable,
}

impl TestDrivenDevelopment {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            runners: PatternTable::from_patterns(&config.tdd.test_runners, true),
        }
    }

    pub fn is_test_run(&self, command: &str) -> bool {
        self.runners.is_match(command)
    }
}

impl Policy for TestDrivenDevelopment {
    fn name(&self) -> &'static str {
        "test_driven_development"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        request.shell_command().is_some_and(classify::is_commit)
    }

    fn evaluate(&self, _request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        let ttl = ctx.config.tdd_ttl();
        let run = ctx
            .records
            .read::<TestRunState>()
            .filter(|r| r.is_valid(ctx.now, ttl));
        match run {
            None => PolicyVerdict::block(
                format!(
                    "No test run detected in this session (or the last run is older than {} minutes). Run tests before committing.",
                    ttl.num_minutes()
                ),
                SUGGESTION,
            ),
            Some(r) if !r.tests_run => {
                PolicyVerdict::block("No test run recorded. Run tests before committing.", SUGGESTION)
            }
            Some(r) if !r.tests_passed => PolicyVerdict::block(
                "Tests failed in last run. Fix failing tests before committing.",
                SUGGESTION,
            ),
            Some(_) => PolicyVerdict::Pass,
        }
    }

    fn observe_outcome(
        &self,
        request: &ActionRequest,
        outcome: &ActionOutcome,
        ctx: &GateContext<'_>,
    ) -> Result<(), StoreError> {
        if request.action_kind != ActionKind::ShellCommand {
            return Ok(());
        }
        let Some(command) = request.shell_command() else {
            return Ok(());
        };
        if !self.is_test_run(command) {
            return Ok(());
        }
        let passed = outcome.succeeded();
        ctx.records.put(&TestRunState::completed(passed, ctx.now))?;
        info!(passed, exit_code = ?outcome.exit_code, "test run recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::policies::testing::{Fixture, t0};

    fn commit_verdict(fx: &Fixture, at: chrono::DateTime<chrono::Utc>) -> PolicyVerdict {
        TestDrivenDevelopment::new(&fx.config).evaluate(&ActionRequest::shell("git commit -m x"), &fx.ctx_at(at))
    }

    fn ran_tests(fx: &Fixture, command: &str, exit_code: i32) {
        TestDrivenDevelopment::new(&fx.config)
            .observe_outcome(
                &ActionRequest::shell(command),
                &ActionOutcome {
                    exit_code: Some(exit_code),
                    output: None,
                },
                &fx.ctx_at(t0()),
            )
            .unwrap();
    }

    #[test]
    fn commit_without_tests_is_blocked() {
        let fx = Fixture::new();
        let PolicyVerdict::Block { reason, .. } = commit_verdict(&fx, t0()) else {
            panic!("expected block");
        };
        assert!(reason.contains("No test run detected"));
    }

    #[test]
    fn passing_run_allows_commit_until_it_expires() {
        let fx = Fixture::new();
        ran_tests(&fx, "cargo test --workspace", 0);
        assert_eq!(commit_verdict(&fx, t0() + Duration::minutes(10)), PolicyVerdict::Pass);

        // An expired run is indistinguishable from no run at all.
        let PolicyVerdict::Block { reason, .. } = commit_verdict(&fx, t0() + Duration::minutes(16)) else {
            panic!("expired run should block");
        };
        assert!(reason.contains("No test run detected"));
    }

    #[test]
    fn failing_run_blocks_commit() {
        let fx = Fixture::new();
        ran_tests(&fx, "npm run test", 1);
        let PolicyVerdict::Block { reason, .. } = commit_verdict(&fx, t0()) else {
            panic!("expected block");
        };
        assert!(reason.starts_with("Tests failed in last run"));
    }

    #[test]
    fn non_test_commands_record_nothing() {
        let fx = Fixture::new();
        ran_tests(&fx, "cargo build", 0);
        assert!(fx.records().read::<TestRunState>().is_none());
    }

    #[test]
    fn recognises_common_runners() {
        let fx = Fixture::new();
        let tdd = TestDrivenDevelopment::new(&fx.config);
        for cmd in [
            "npm test",
            "yarn run test",
            "pnpm test",
            "python -m pytest -q",
            "npx jest",
            "mocha",
            "vitest run",
            "go test ./...",
            "dotnet test",
            "mvn test",
            "gradle test",
        ] {
            assert!(tdd.is_test_run(cmd), "{cmd}");
        }
        assert!(!tdd.is_test_run("cargo build"));
    }

    #[test]
    fn only_commits_apply() {
        let fx = Fixture::new();
        let tdd = TestDrivenDevelopment::new(&fx.config);
        assert!(tdd.applies_to(&ActionRequest::shell("git commit -am fix")));
        assert!(!tdd.applies_to(&ActionRequest::shell("git push")));
        assert!(!tdd.applies_to(&ActionRequest::file_write("src/lib.rs")));
    }
}
