//! [`StatusSnapshot`] – a read-only view of every record, for operators.
//!
//! Collecting a snapshot never writes; unreadable records show up as their
//! defaults, exactly as the policies would see them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use hookgate_store::{Records, StateStore};
use hookgate_types::{
    Consultation, ConsultationLog, ContextUsage, DocId, FeatureGovernanceState, FeatureRecord,
    LastSyncMarker, PendingDecision, PendingDecisions, TestRunState,
};

use crate::config::GateConfig;
use crate::context_usage::{ContextLevel, ContextTracker};
use crate::policies::RecitationLevel;
use crate::policy::GateContext;

const RECENT_CONSULTATIONS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub session_start: DateTime<Utc>,
    pub initialized: bool,
    pub docs_read: Vec<DocId>,
    pub missing_docs: Vec<DocId>,
    pub significant_actions: u64,
    pub compaction_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecitationStatus {
    pub actions_since_recitation: u64,
    pub level: &'static str,
    pub last_recitation: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TddStatus {
    /// `true` while a recorded run is inside the TTL.
    pub valid: bool,
    pub tests_passed: Option<bool>,
    pub last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureStatus {
    pub name: String,
    pub current: bool,
    #[serde(flatten)]
    pub record: FeatureRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextStatus {
    pub estimated_tokens: u64,
    pub tool_calls: u64,
    pub compaction_reminders: u64,
    pub level: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub generated_at: DateTime<Utc>,
    pub session: SessionStatus,
    pub recitation: RecitationStatus,
    pub tdd: TddStatus,
    pub recent_consultations: Vec<Consultation>,
    pub features: Vec<FeatureStatus>,
    pub last_sync: Option<DateTime<Utc>>,
    pub minutes_since_sync: Option<i64>,
    pub context: ContextStatus,
    /// Decisions still waiting for an ADR, oldest first.
    pub pending_decisions: Vec<PendingDecision>,
    pub recommendations: Vec<String>,
}

impl StatusSnapshot {
    pub fn collect(
        store: &dyn StateStore,
        config: &GateConfig,
        project_root: &std::path::Path,
        now: DateTime<Utc>,
    ) -> Self {
        let ctx = GateContext {
            records: Records::new(store),
            config,
            project_root,
            now,
        };
        let session = ctx.session();

        let level = RecitationLevel::for_count(session.actions_since_recitation, config);
        let recitation = RecitationStatus {
            actions_since_recitation: session.actions_since_recitation,
            level: match level {
                RecitationLevel::Ok => "ok",
                RecitationLevel::Warn => "warn",
                RecitationLevel::Block => "overdue",
            },
            last_recitation: session.last_recitation,
        };

        let run = ctx.records.read::<TestRunState>();
        let tdd = TddStatus {
            valid: run.as_ref().is_some_and(|r| r.is_valid(now, config.tdd_ttl())),
            tests_passed: run.as_ref().map(|r| r.tests_passed),
            last_run: run.as_ref().map(|r| r.timestamp),
        };

        let log = ctx.records.read_or_else(ConsultationLog::default);
        let recent_consultations: Vec<Consultation> = log
            .entries
            .iter()
            .rev()
            .take(RECENT_CONSULTATIONS)
            .cloned()
            .collect();

        let governance = ctx.records.read_or_else(FeatureGovernanceState::default);
        let features = governance
            .features
            .iter()
            .map(|(name, record)| FeatureStatus {
                name: name.clone(),
                current: governance.current_feature.as_deref() == Some(name.as_str()),
                record: record.clone(),
            })
            .collect();

        let last_sync = ctx.records.read::<LastSyncMarker>().map(|m| m.timestamp);

        let usage = ctx.records.read_or_else(ContextUsage::default);
        let context_level = ContextTracker::new(config).level(usage.estimated_tokens);
        let context = ContextStatus {
            estimated_tokens: usage.estimated_tokens,
            tool_calls: usage.tool_calls,
            compaction_reminders: usage.compaction_reminders,
            level: match context_level {
                ContextLevel::Normal => "normal",
                ContextLevel::Warning => "warning",
                ContextLevel::Critical => "critical",
            },
        };

        let pending_decisions = ctx.records.read_or_else(PendingDecisions::default).entries;

        let mut snapshot = Self {
            generated_at: now,
            session: SessionStatus {
                session_id: session.session_id.clone(),
                session_start: session.session_start,
                initialized: session.initialized,
                docs_read: session.required_docs_read.iter().copied().collect(),
                missing_docs: session.missing_required_docs(),
                significant_actions: session.significant_actions,
                compaction_count: session.compaction_count,
            },
            recitation,
            tdd,
            recent_consultations,
            features,
            last_sync,
            minutes_since_sync: last_sync.map(|t| (now - t).num_minutes()),
            context,
            pending_decisions,
            recommendations: Vec::new(),
        };
        snapshot.recommendations = snapshot.recommend(config);
        snapshot
    }

    fn recommend(&self, config: &GateConfig) -> Vec<String> {
        let mut out = Vec::new();
        if !self.session.initialized {
            let missing: Vec<String> = self.session.missing_docs.iter().map(ToString::to_string).collect();
            out.push(format!("Read the memory bank to initialize the session: {}", missing.join(", ")));
        }
        match self.recitation.level {
            "overdue" => out.push(format!(
                "Recitation overdue: update {} now",
                config.recitation.artifact
            )),
            "warn" => out.push(format!("Update {} soon", config.recitation.artifact)),
            _ => {}
        }
        if !self.tdd.valid {
            out.push("Run the test suite before the next commit".to_string());
        } else if self.tdd.tests_passed == Some(false) {
            out.push("Fix failing tests before committing".to_string());
        }
        if self.context.level != "normal" {
            out.push("Context is filling up: sync memory and consider compacting".to_string());
        }
        if !self.pending_decisions.is_empty() {
            out.push(format!(
                "Document {} pending decision(s) in an ADR",
                self.pending_decisions.len()
            ));
        }
        for feature in &self.features {
            if !feature.record.prd_exists {
                out.push(format!("Feature '{}' has no PRD", feature.name));
            }
        }
        out
    }
}
