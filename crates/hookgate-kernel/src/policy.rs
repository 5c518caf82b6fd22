//! The [`Policy`] trait and the per-invocation [`GateContext`] every policy
//! evaluates against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use hookgate_store::{Records, StoreError};
use hookgate_types::{ActionOutcome, ActionRequest, SessionState, Severity};

use crate::config::GateConfig;

// ─────────────────────────────────────────────────────────────────────────────
// PolicyVerdict
// ─────────────────────────────────────────────────────────────────────────────

/// What a single policy thinks of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Pass,
    /// Allowed, with a message for the agent. `severity` decides whether the
    /// warning is also forwarded to the notifier.
    Warn { message: String, severity: Severity },
    /// Terminal. No later policy runs.
    Block {
        reason: String,
        suggestion: Option<String>,
    },
}

impl PolicyVerdict {
    pub fn warn(message: impl Into<String>) -> Self {
        PolicyVerdict::Warn {
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn block(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        PolicyVerdict::Block {
            reason: reason.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GateContext
// ─────────────────────────────────────────────────────────────────────────────

/// Everything a policy may consult during one invocation.
pub struct GateContext<'a> {
    pub records: Records<'a>,
    pub config: &'a GateConfig,
    pub project_root: &'a Path,
    pub now: DateTime<Utc>,
}

impl GateContext<'_> {
    /// The live session. A missing, corrupt, or stale record reads as a
    /// fresh session.
    pub fn session(&self) -> SessionState {
        match self.records.read::<SessionState>() {
            Some(s) if !s.is_stale(self.now, self.config.stale_window()) => s,
            Some(s) => renewed(&s, self.now),
            None => SessionState::new(self.now),
        }
    }

    /// Atomically mutate the live session, replacing a stale one first.
    pub fn update_session(
        &self,
        mut apply: impl FnMut(&mut SessionState),
    ) -> Result<SessionState, StoreError> {
        let now = self.now;
        let window = self.config.stale_window();
        self.records.update(
            || SessionState::new(now),
            |s| {
                if s.is_stale(now, window) {
                    debug!(session_id = %s.session_id, "session expired; starting a new one");
                    *s = renewed(s, now);
                }
                apply(s);
            },
        )
    }

    /// `relative` resolved inside the project's control directory.
    pub fn control_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.project_root.join(&self.config.control_dir).join(relative)
    }
}

/// A new session that keeps the lifetime compaction count.
fn renewed(old: &SessionState, now: DateTime<Utc>) -> SessionState {
    SessionState {
        compaction_count: old.compaction_count,
        ..SessionState::new(now)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy trait
// ─────────────────────────────────────────────────────────────────────────────

/// One gate policy.
///
/// `evaluate` must not write state; all mutation happens in `observe`
/// (after an allowed pre-action evaluation) or `observe_outcome` (after the
/// action ran). Observation errors are logged by the engine and dropped.
pub trait Policy {
    fn name(&self) -> &'static str;

    fn applies_to(&self, request: &ActionRequest) -> bool;

    fn evaluate(&self, request: &ActionRequest, ctx: &GateContext<'_>) -> PolicyVerdict;

    fn observe(&self, _request: &ActionRequest, _ctx: &GateContext<'_>) -> Result<(), StoreError> {
        Ok(())
    }

    fn observe_outcome(
        &self,
        _request: &ActionRequest,
        _outcome: &ActionOutcome,
        _ctx: &GateContext<'_>,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hookgate_store::MemoryStore;

    use super::*;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn missing_session_reads_fresh() {
        let store = MemoryStore::new();
        let config = GateConfig::default();
        let ctx = GateContext {
            records: Records::new(&store),
            config: &config,
            project_root: Path::new("."),
            now: t0(),
        };
        let s = ctx.session();
        assert!(!s.initialized);
        assert_eq!(s.session_start, t0());
    }

    #[test]
    fn stale_session_is_replaced_but_keeps_compaction_count() {
        let store = MemoryStore::new();
        let config = GateConfig::default();
        let mut old = SessionState::new(t0());
        old.compaction_count = 2;
        old.actions_since_recitation = 4;
        Records::new(&store).put(&old).unwrap();

        let later = t0() + Duration::hours(5);
        let ctx = GateContext {
            records: Records::new(&store),
            config: &config,
            project_root: Path::new("."),
            now: later,
        };
        assert_eq!(ctx.session().actions_since_recitation, 0);

        let updated = ctx
            .update_session(|s| s.significant_actions += 1)
            .unwrap();
        assert_ne!(updated.session_id, old.session_id);
        assert_eq!(updated.compaction_count, 2);
        assert_eq!(updated.significant_actions, 1);
        assert_eq!(updated.session_start, later);
    }
}
