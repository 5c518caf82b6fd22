//! [`DecisionEngine`] – the single decision point between an agent and the
//! action it proposes.
//!
//! Policies run in a fixed priority order:
//!
//! 1. [`FileRestriction`][crate::policies::FileRestriction]
//! 2. [`DangerousCommand`][crate::policies::DangerousCommand]
//! 3. [`GitWorktreeSafety`][crate::policies::GitWorktreeSafety]
//! 4. [`SessionInitialization`][crate::policies::SessionInitialization]
//! 5. [`FeatureGovernance`][crate::policies::FeatureGovernance]
//! 6. [`TestDrivenDevelopment`][crate::policies::TestDrivenDevelopment]
//! 7. [`AgentConsultation`][crate::policies::AgentConsultation]
//! 8. [`RecitationLoop`][crate::policies::RecitationLoop]
//!
//! The first `Block` ends evaluation: later policies do not run and nothing
//! is observed. Otherwise warnings accumulate in order, the verdict is
//! `Allow`, and every applicable policy observes the request so the next
//! invocation sees it.
//!
//! Storage never decides anything. Unreadable records evaluate as their
//! defaults and failed writes are logged and dropped.
//!
//! # Example
//!
//! ```
//! use hookgate_kernel::{DecisionEngine, GateConfig};
//! use hookgate_store::MemoryStore;
//! use hookgate_types::{ActionRequest, NullNotifier};
//!
//! let engine = DecisionEngine::new(GateConfig::default(), ".");
//! let store = MemoryStore::new();
//!
//! let decision = engine.evaluate(&ActionRequest::shell("rm -rf /"), &store, &NullNotifier);
//! assert!(decision.is_blocked());
//!
//! let decision = engine.evaluate(&ActionRequest::shell("ls -la"), &store, &NullNotifier);
//! assert!(!decision.is_blocked());
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use hookgate_store::{Records, StateStore, StoreError};
use hookgate_types::{
    ActionOutcome, ActionRequest, Decision, LastSyncMarker, Notifier, PendingDecisions, PostResponse,
    SessionState, Severity,
};

use crate::config::GateConfig;
use crate::context_usage::ContextTracker;
use crate::policies;
use crate::policy::{GateContext, Policy, PolicyVerdict};

pub struct DecisionEngine {
    config: GateConfig,
    project_root: PathBuf,
    policies: Vec<Box<dyn Policy>>,
}

impl DecisionEngine {
    /// Compile every policy from `config` for the project at `project_root`.
    pub fn new(config: GateConfig, project_root: impl Into<PathBuf>) -> Self {
        let policies = policies::standard(&config);
        Self {
            config,
            project_root: project_root.into(),
            policies,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn context<'a>(&'a self, store: &'a dyn StateStore, now: DateTime<Utc>) -> GateContext<'a> {
        GateContext {
            records: Records::new(store).with_max_attempts(self.config.store.max_attempts),
            config: &self.config,
            project_root: &self.project_root,
            now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pre-action
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(
        &self,
        request: &ActionRequest,
        store: &dyn StateStore,
        notifier: &dyn Notifier,
    ) -> Decision {
        self.evaluate_at(request, store, notifier, Utc::now())
    }

    /// [`evaluate`][Self::evaluate] with an explicit clock.
    #[instrument(skip_all, fields(kind = ?request.action_kind))]
    pub fn evaluate_at(
        &self,
        request: &ActionRequest,
        store: &dyn StateStore,
        notifier: &dyn Notifier,
        now: DateTime<Utc>,
    ) -> Decision {
        let ctx = self.context(store, now);

        if let Err(e) = ContextTracker::new(&self.config).record_call(&ctx.records) {
            warn!(error = %e, "failed to count tool call");
        }

        let applicable: Vec<&dyn Policy> = self
            .policies
            .iter()
            .map(Box::as_ref)
            .filter(|p| p.applies_to(request))
            .collect();

        let mut warnings = Vec::new();
        for policy in &applicable {
            match policy.evaluate(request, &ctx) {
                PolicyVerdict::Pass => {}
                PolicyVerdict::Warn { message, severity } => {
                    debug!(policy = policy.name(), %severity, "warning raised");
                    if severity >= Severity::Error {
                        notifier.notify(&format!("HookGate: {}", policy.name()), &message, severity);
                    }
                    warnings.push(message);
                }
                PolicyVerdict::Block { reason, suggestion } => {
                    info!(policy = policy.name(), %reason, "action blocked");
                    notifier.notify(
                        &format!("HookGate blocked an action ({})", policy.name()),
                        &reason,
                        Severity::Warning,
                    );
                    return Decision::block(reason, suggestion).with_warnings(warnings);
                }
            }
        }

        for policy in &applicable {
            if let Err(e) = policy.observe(request, &ctx) {
                warn!(policy = policy.name(), error = %e, "state update failed; decision unaffected");
            }
        }
        Decision::allow().with_warnings(warnings)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Post-action
    // ─────────────────────────────────────────────────────────────────────────

    pub fn observe_outcome(
        &self,
        request: &ActionRequest,
        outcome: &ActionOutcome,
        store: &dyn StateStore,
    ) -> PostResponse {
        self.observe_outcome_at(request, outcome, store, Utc::now())
    }

    /// Feed a completed action back into policy state and context
    /// accounting.
    #[instrument(skip_all, fields(kind = ?request.action_kind, exit_code = ?outcome.exit_code))]
    pub fn observe_outcome_at(
        &self,
        request: &ActionRequest,
        outcome: &ActionOutcome,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> PostResponse {
        let ctx = self.context(store, now);
        for policy in &self.policies {
            if let Err(e) = policy.observe_outcome(request, outcome, &ctx) {
                warn!(policy = policy.name(), error = %e, "post-action state update failed");
            }
        }
        ContextTracker::new(&self.config)
            .record_outcome(&ctx.records, request, outcome)
            .unwrap_or_else(|e| {
                warn!(error = %e, "context accounting failed");
                PostResponse::default()
            })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operator events
    // ─────────────────────────────────────────────────────────────────────────

    /// Stamp the memory bank as freshly synced.
    pub fn record_sync(&self, store: &dyn StateStore, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.context(store, now)
            .records
            .put(&LastSyncMarker { timestamp: now })?;
        info!("memory sync recorded");
        Ok(())
    }

    pub fn record_consultation(
        &self,
        store: &dyn StateStore,
        agent: &str,
        purpose: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        policies::record_consultation(&self.context(store, now), agent, purpose)
    }

    /// The host compacted the agent's context: the memory bank must be read
    /// again and token accounting restarts from the summary.
    pub fn record_compaction(
        &self,
        store: &dyn StateStore,
        now: DateTime<Utc>,
    ) -> Result<SessionState, StoreError> {
        let ctx = self.context(store, now);
        let session = ctx.update_session(|s| {
            s.compaction_count += 1;
            s.forget_docs();
        })?;
        ContextTracker::new(&self.config).record_compaction(&ctx.records)?;
        info!(compactions = session.compaction_count, "context compaction recorded");
        Ok(session)
    }

    /// Note a decision that still needs an ADR. `false` if already pending.
    pub fn record_decision(
        &self,
        store: &dyn StateStore,
        decision: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut added = false;
        self.context(store, now)
            .records
            .update(PendingDecisions::default, |p| added = p.add(decision, now))?;
        debug!(added, "pending decision recorded");
        Ok(added)
    }

    /// The ADR for `decision` was written. `false` if it was not pending.
    pub fn resolve_decision(
        &self,
        store: &dyn StateStore,
        decision: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut resolved = false;
        self.context(store, now)
            .records
            .update(PendingDecisions::default, |p| resolved = p.resolve(decision))?;
        Ok(resolved)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
