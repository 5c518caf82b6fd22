//! Reviewer sign-off before code leaves the worktree.
//!
//! | operation | required reviewers              | when missing |
//! |-----------|---------------------------------|--------------|
//! | commit    | `qa-engineer`                   | warn         |
//! | push      | `architect`, `security-auditor` | block        |
//! | merge     | `architect`, `security-auditor` | block        |
//!
//! Only consultations recorded within the window (24 h by default) count.

use std::collections::BTreeSet;

use hookgate_store::StoreError;
use hookgate_types::{
    ActionKind, ActionOutcome, ActionRequest, Consultation, ConsultationLog, ConsultedAgent, Severity,
};
use tracing::{debug, info};

use crate::classify::{self, GitOp};
use crate::policy::{GateContext, Policy, PolicyVerdict};

const PURPOSE_MAX_CHARS: usize = 120;

#[derive(Default)]
pub struct AgentConsultation;

impl AgentConsultation {
    pub fn new() -> Self {
        Self
    }

    /// The reviewer role an agent invocation addresses: the host-supplied
    /// name when present, otherwise the first known role named in the prompt.
    pub fn resolve_agent(request: &ActionRequest, known_agents: &[String]) -> Option<String> {
        if let Some(agent) = request.agent.as_deref().map(str::trim)
            && !agent.is_empty()
        {
            return Some(agent.to_ascii_lowercase());
        }
        let prompt = request.agent_prompt.as_deref()?.to_ascii_lowercase();
        known_agents
            .iter()
            .find(|known| prompt.contains(&known.to_ascii_lowercase()))
            .map(|known| known.to_ascii_lowercase())
    }

    fn required<'c>(op: GitOp, ctx: &'c GateContext<'_>) -> &'c [String] {
        let table = &ctx.config.consultation;
        match op {
            GitOp::Commit => &table.commit,
            GitOp::Push => &table.push,
            GitOp::Merge => &table.merge,
        }
    }
}

fn op_name(op: GitOp) -> &'static str {
    match op {
        GitOp::Commit => "commit",
        GitOp::Push => "push",
        GitOp::Merge => "merge",
    }
}

/// Append a consultation to the log and to the live session.
pub fn record_consultation(
    ctx: &GateContext<'_>,
    agent: &str,
    purpose: &str,
) -> Result<(), StoreError> {
    let agent = agent.trim().to_ascii_lowercase();
    let purpose: String = purpose.trim().chars().take(PURPOSE_MAX_CHARS).collect();
    let cap = ctx.config.consultation.log_cap;
    ctx.records.update(ConsultationLog::default, |log| {
        log.push(
            Consultation {
                agent: agent.clone(),
                purpose: purpose.clone(),
                timestamp: ctx.now,
            },
            cap,
        );
    })?;
    ctx.update_session(|s| {
        s.consulted_agents.push(ConsultedAgent {
            agent: agent.clone(),
            timestamp: ctx.now,
        });
    })?;
    info!(%agent, "consultation recorded");
    Ok(())
}

impl Policy for AgentConsultation {
    fn name(&self) -> &'static str {
        "agent_consultation"
    }

    fn applies_to(&self, request: &ActionRequest) -> bool {
        match request.action_kind {
            ActionKind::AgentInvocation => true,
            ActionKind::ShellCommand => request
                .shell_command()
                .is_some_and(|c| !classify::git_operations(c).is_empty()),
            _ => false,
        }
    }

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict {
        let Some(command) = request.shell_command() else {
            return PolicyVerdict::Pass;
        };
        let ops = classify::git_operations(command);
        if ops.is_empty() {
            return PolicyVerdict::Pass;
        }

        let log = ctx.records.read_or_else(ConsultationLog::default);
        let window = ctx.config.consultation_window();
        let consulted: BTreeSet<String> = log
            .recent(ctx.now, window)
            .map(|c| c.agent.to_ascii_lowercase())
            .collect();

        let mut blocking: Vec<&str> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for op in &ops {
            let absent: Vec<&String> = Self::required(*op, ctx)
                .iter()
                .filter(|a| !consulted.contains(&a.to_ascii_lowercase()))
                .collect();
            if absent.is_empty() {
                continue;
            }
            if *op != GitOp::Commit {
                blocking.push(op_name(*op));
            }
            for a in absent {
                if !missing.contains(a) {
                    missing.push(a.clone());
                }
            }
        }
        if missing.is_empty() {
            return PolicyVerdict::Pass;
        }

        let agents = missing.join(", ");
        let hours = window.num_hours();
        let suggestion = format!("Invoke the {agents} agent(s) to review the changes, then retry.");
        if blocking.is_empty() {
            PolicyVerdict::Warn {
                message: format!(
                    "Committing without a recent review from: {agents} (none in the last {hours}h). {suggestion}"
                ),
                severity: Severity::Warning,
            }
        } else {
            PolicyVerdict::block(
                format!(
                    "Required consultation missing before {}: {agents} (none in the last {hours}h)",
                    blocking.join("/")
                ),
                suggestion,
            )
        }
    }

    /// A review only counts once the agent actually ran to completion.
    fn observe_outcome(
        &self,
        request: &ActionRequest,
        outcome: &ActionOutcome,
        ctx: &GateContext<'_>,
    ) -> Result<(), StoreError> {
        if request.action_kind != ActionKind::AgentInvocation {
            return Ok(());
        }
        if !outcome.succeeded() {
            debug!(exit_code = ?outcome.exit_code, "agent invocation failed; not counted as a consultation");
            return Ok(());
        }
        let Some(agent) = Self::resolve_agent(request, &ctx.config.consultation.known_agents) else {
            return Ok(());
        };
        let purpose = request
            .agent_prompt
            .as_deref()
            .and_then(|p| p.lines().find(|l| !l.trim().is_empty()))
            .unwrap_or_default();
        record_consultation(ctx, &agent, purpose)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hookgate_types::SessionState;

    use super::*;
    use crate::policies::testing::{Fixture, t0};

    fn verdict(fx: &Fixture, command: &str, at: chrono::DateTime<chrono::Utc>) -> PolicyVerdict {
        AgentConsultation::new().evaluate(&ActionRequest::shell(command), &fx.ctx_at(at))
    }

    #[test]
    fn push_without_reviews_blocks_listing_agents() {
        let fx = Fixture::new();
        let PolicyVerdict::Block { reason, suggestion } = verdict(&fx, "git push origin main", t0()) else {
            panic!("expected block");
        };
        assert!(reason.contains("architect"));
        assert!(reason.contains("security-auditor"));
        assert!(suggestion.unwrap().contains("Invoke"));
    }

    #[test]
    fn commit_without_qa_only_warns() {
        let fx = Fixture::new();
        let PolicyVerdict::Warn { message, .. } = verdict(&fx, "git commit -m x", t0()) else {
            panic!("expected warning");
        };
        assert!(message.contains("qa-engineer"));
    }

    #[test]
    fn recent_consultations_satisfy_the_gate() {
        let fx = Fixture::new();
        let ctx = fx.ctx_at(t0());
        record_consultation(&ctx, "architect", "review").unwrap();
        record_consultation(&ctx, "Security-Auditor", "audit").unwrap();
        assert_eq!(verdict(&fx, "git merge feat/x", t0() + Duration::hours(2)), PolicyVerdict::Pass);

        // Outside the window they no longer count.
        assert!(matches!(
            verdict(&fx, "git merge feat/x", t0() + Duration::hours(25)),
            PolicyVerdict::Block { .. }
        ));
    }

    #[test]
    fn partial_reviews_name_only_the_missing_agent() {
        let fx = Fixture::new();
        record_consultation(&fx.ctx_at(t0()), "architect", "").unwrap();
        let PolicyVerdict::Block { reason, .. } = verdict(&fx, "git push", t0()) else {
            panic!("expected block");
        };
        assert!(reason.contains("security-auditor"));
        assert!(!reason.contains("architect,"));
    }

    fn exited(code: i32) -> ActionOutcome {
        ActionOutcome {
            exit_code: Some(code),
            output: None,
        }
    }

    #[test]
    fn completed_agent_invocation_is_logged_in_log_and_session() {
        let fx = Fixture::new();
        let policy = AgentConsultation::new();
        let request = ActionRequest::agent_invocation(
            Some("qa-engineer".into()),
            "Review test coverage\nfor the login flow",
        );
        policy.observe(&request, &fx.ctx_at(t0())).unwrap();
        assert!(fx.records().read::<ConsultationLog>().is_none(), "proposal alone records nothing");

        policy.observe_outcome(&request, &exited(0), &fx.ctx_at(t0())).unwrap();

        let log: ConsultationLog = fx.records().read().unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].purpose, "Review test coverage");
        let session: SessionState = fx.records().read().unwrap();
        assert_eq!(session.consulted_agents[0].agent, "qa-engineer");

        assert_eq!(verdict(&fx, "git commit -m x", t0()), PolicyVerdict::Pass);
    }

    #[test]
    fn failed_agent_invocation_is_not_a_consultation() {
        let fx = Fixture::new();
        let request = ActionRequest::agent_invocation(Some("architect".into()), "review design");
        AgentConsultation::new()
            .observe_outcome(&request, &exited(1), &fx.ctx_at(t0()))
            .unwrap();
        assert!(fx.records().read::<ConsultationLog>().is_none());
        assert!(matches!(verdict(&fx, "git push", t0()), PolicyVerdict::Block { .. }));
    }

    #[test]
    fn agent_is_recognised_from_prompt_when_unnamed() {
        let known = fx_known();
        let req = ActionRequest::agent_invocation(None, "Ask the Security-Auditor to check auth");
        assert_eq!(
            AgentConsultation::resolve_agent(&req, &known).as_deref(),
            Some("security-auditor")
        );
        let anon = ActionRequest::agent_invocation(None, "summarise the diff");
        assert_eq!(AgentConsultation::resolve_agent(&anon, &known), None);
    }

    fn fx_known() -> Vec<String> {
        crate::config::GateConfig::default().consultation.known_agents
    }

    #[test]
    fn log_is_capped() {
        let mut fx = Fixture::new();
        fx.config.consultation.log_cap = 3;
        for i in 0..5 {
            record_consultation(&fx.ctx_at(t0()), &format!("agent-{i}"), "").unwrap();
        }
        let log: ConsultationLog = fx.records().read().unwrap();
        assert_eq!(log.entries.len(), 3);
        assert_eq!(log.entries[0].agent, "agent-2");
    }
}
