//! State records persisted between gate invocations.
//!
//! Every gate run is a fresh process, so anything a policy needs to remember
//! lives in one of these records on the state store. Each record is a small
//! JSON document; the store decides how documents are laid out physically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// SessionState
// ─────────────────────────────────────────────────────────────────────────────

/// Memory-bank documents an agent must read at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocId {
    #[serde(rename = "projectbrief")]
    ProjectBrief,
    #[serde(rename = "systemPatterns")]
    SystemPatterns,
    #[serde(rename = "activeContext")]
    ActiveContext,
    #[serde(rename = "decisionLog")]
    DecisionLog,
}

impl DocId {
    pub const ALL: [DocId; 4] = [
        DocId::ProjectBrief,
        DocId::SystemPatterns,
        DocId::ActiveContext,
        DocId::DecisionLog,
    ];

    /// Documents whose reading completes session initialization.
    pub const REQUIRED: [DocId; 3] = [DocId::ProjectBrief, DocId::SystemPatterns, DocId::ActiveContext];

    /// Conventional file name of the document inside the memory bank.
    pub fn file_name(self) -> &'static str {
        match self {
            DocId::ProjectBrief => "projectbrief.md",
            DocId::SystemPatterns => "systemPatterns.md",
            DocId::ActiveContext => "activeContext.md",
            DocId::DecisionLog => "decisionLog.md",
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// A reviewer role consulted during the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultedAgent {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-session protocol state.
///
/// Invariant: `initialized` is true exactly when every [`DocId::REQUIRED`]
/// document is in `required_docs_read`. Mutate the document set only through
/// [`SessionState::mark_doc_read`] and [`SessionState::forget_docs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub session_start: DateTime<Utc>,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub required_docs_read: BTreeSet<DocId>,
    #[serde(default)]
    pub significant_actions: u64,
    #[serde(default)]
    pub actions_since_recitation: u64,
    #[serde(default)]
    pub last_recitation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consulted_agents: Vec<ConsultedAgent>,
    #[serde(default)]
    pub compaction_count: u64,
}

impl SessionState {
    /// A brand-new session starting at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_id: format!("session-{}", Uuid::new_v4()),
            session_start: now,
            initialized: false,
            required_docs_read: BTreeSet::new(),
            significant_actions: 0,
            actions_since_recitation: 0,
            last_recitation: None,
            consulted_agents: Vec::new(),
            compaction_count: 0,
        }
    }

    /// `true` once the session is older than `window`.
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.session_start > window
    }

    /// Record that `doc` was read. Returns `true` if the set changed;
    /// reading the same document again is a no-op.
    pub fn mark_doc_read(&mut self, doc: DocId) -> bool {
        let inserted = self.required_docs_read.insert(doc);
        self.initialized = self.missing_required_docs().is_empty();
        inserted
    }

    /// Drop every read marker (after a context compaction).
    pub fn forget_docs(&mut self) {
        self.required_docs_read.clear();
        self.initialized = false;
    }

    /// Required documents not yet read, in canonical order.
    pub fn missing_required_docs(&self) -> Vec<DocId> {
        DocId::REQUIRED
            .into_iter()
            .filter(|d| !self.required_docs_read.contains(d))
            .collect()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TestRunState
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of the most recent test-runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunState {
    pub tests_run: bool,
    pub tests_passed: bool,
    pub timestamp: DateTime<Utc>,
}

impl TestRunState {
    pub fn completed(passed: bool, now: DateTime<Utc>) -> Self {
        Self {
            tests_run: true,
            tests_passed: passed,
            timestamp: now,
        }
    }

    /// A test run only counts while it is younger than `ttl`.
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp < ttl
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature governance
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle phase of a governed feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Brainstorm,
    Plan,
    Decompose,
    Sync,
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Brainstorm => "brainstorm",
            Phase::Plan => "plan",
            Phase::Decompose => "decompose",
            Phase::Sync => "sync",
            Phase::Execute => "execute",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub phase: Phase,
    pub prd_exists: bool,
    pub epic_exists: bool,
    pub started: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGovernanceState {
    #[serde(default)]
    pub features: BTreeMap<String, FeatureRecord>,
    #[serde(default)]
    pub current_feature: Option<String>,
}

impl FeatureGovernanceState {
    /// Create or refresh the record for `name` and make it current. The
    /// `started` stamp is kept from the first sighting.
    pub fn upsert(&mut self, name: &str, phase: Phase, prd_exists: bool, epic_exists: bool, now: DateTime<Utc>) {
        let record = self.features.entry(name.to_string()).or_insert(FeatureRecord {
            phase,
            prd_exists,
            epic_exists,
            started: now,
        });
        record.phase = phase;
        record.prd_exists = prd_exists;
        record.epic_exists = epic_exists;
        self.current_feature = Some(name.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Append-only logs
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded advisory review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub agent: String,
    pub purpose: String,
    pub timestamp: DateTime<Utc>,
}

/// Consultations in arrival order, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationLog {
    pub entries: Vec<Consultation>,
}

impl ConsultationLog {
    /// Append `entry`, evicting the oldest entries beyond `cap`.
    pub fn push(&mut self, entry: Consultation, cap: usize) {
        self.entries.push(entry);
        evict_front(&mut self.entries, cap);
    }

    /// Entries no older than `window`.
    pub fn recent(&self, now: DateTime<Utc>, window: Duration) -> impl Iterator<Item = &Consultation> {
        self.entries.iter().filter(move |c| now - c.timestamp <= window)
    }
}

/// One significant action counted toward the recitation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecitationEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub description: String,
    pub actions_since_recitation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecitationLog {
    pub entries: Vec<RecitationEntry>,
}

impl RecitationLog {
    pub fn push(&mut self, entry: RecitationEntry, cap: usize) {
        self.entries.push(entry);
        evict_front(&mut self.entries, cap);
    }
}

fn evict_front<T>(entries: &mut Vec<T>, cap: usize) {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Small single-value records
// ─────────────────────────────────────────────────────────────────────────────

/// When the memory bank was last synced by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSyncMarker {
    pub timestamp: DateTime<Utc>,
}

/// Rough context-window accounting, fed by post-action observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUsage {
    #[serde(default)]
    pub estimated_tokens: u64,
    #[serde(default)]
    pub tool_calls: u64,
    #[serde(default)]
    pub compaction_reminders: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Pending architecture decisions
// ─────────────────────────────────────────────────────────────────────────────

/// A decision taken during the session that still needs an ADR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub decision: String,
    pub timestamp: DateTime<Utc>,
}

/// Decisions awaiting an ADR. Unlike [`SessionState`] this survives session
/// renewal: an undocumented decision stays owed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecisions {
    #[serde(default)]
    pub entries: Vec<PendingDecision>,
}

impl PendingDecisions {
    /// Returns `false` when an identical decision is already pending.
    pub fn add(&mut self, decision: &str, now: DateTime<Utc>) -> bool {
        let decision = decision.trim();
        if decision.is_empty() || self.entries.iter().any(|d| d.decision == decision) {
            return false;
        }
        self.entries.push(PendingDecision {
            decision: decision.to_string(),
            timestamp: now,
        });
        true
    }

    /// Returns `true` when `decision` was pending.
    pub fn resolve(&mut self, decision: &str) -> bool {
        let decision = decision.trim();
        let before = self.entries.len();
        self.entries.retain(|d| d.decision != decision);
        self.entries.len() != before
    }
}
