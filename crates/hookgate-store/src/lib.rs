//! `hookgate-store` – durable state shared by independent gate invocations.
//!
//! Every gate invocation is a short-lived process; the only thing that
//! survives between them is what this crate writes. Records are small JSON
//! documents addressed by a [`RecordKey`], each carrying a monotonically
//! increasing version.
//!
//! # Modules
//!
//! - [`sqlite`] – [`SqliteStore`][sqlite::SqliteStore]: one SQLite file,
//!   one row per record, compare-and-swap inside `BEGIN IMMEDIATE`.
//! - [`memory`] – [`MemoryStore`][memory::MemoryStore]: a process-local store
//!   for tests and as a fallback when the database cannot be opened.
//! - [`access`] – [`Records`][access::Records]: typed, fail-soft access with
//!   optimistic read-modify-write retries.
//!
//! # Concurrency
//!
//! Two invocations updating the same record never lose an update: an update
//! reads `(version, body)`, applies its change, and writes back only if the
//! version is unchanged, retrying otherwise.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use hookgate_types::{
    ConsultationLog, ContextUsage, FeatureGovernanceState, LastSyncMarker, PendingDecisions,
    RecitationLog, SessionState, TestRunState,
};

pub mod access;
pub mod memory;
pub mod sqlite;

pub use access::Records;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Record `{key}` still contended after {attempts} attempts")]
    Contended { key: RecordKey, attempts: u32 },
    #[error("Store lock poisoned")]
    Poisoned,
    #[error("Unknown record key: {0}")]
    UnknownKey(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Keys and records
// ─────────────────────────────────────────────────────────────────────────────

/// Logical name of each stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Session,
    TestRun,
    Consultations,
    Governance,
    RecitationLog,
    LastSync,
    Context,
    Decisions,
}

impl RecordKey {
    pub const ALL: [RecordKey; 8] = [
        RecordKey::Session,
        RecordKey::TestRun,
        RecordKey::Consultations,
        RecordKey::Governance,
        RecordKey::RecitationLog,
        RecordKey::LastSync,
        RecordKey::Context,
        RecordKey::Decisions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKey::Session => "session",
            RecordKey::TestRun => "test_run",
            RecordKey::Consultations => "consultations",
            RecordKey::Governance => "governance",
            RecordKey::RecitationLog => "recitation_log",
            RecordKey::LastSync => "last_sync",
            RecordKey::Context => "context",
            RecordKey::Decisions => "decisions",
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StoreError::UnknownKey(s.to_string()))
    }
}

/// A raw stored document together with its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub version: u64,
    pub body: String,
}

/// Keyed, versioned document storage.
///
/// Implementations only need to make [`StateStore::compare_and_swap`] atomic;
/// everything else is built on top of it by [`Records`].
pub trait StateStore {
    /// Fetch the current document, `None` when it was never written.
    fn load(&self, key: RecordKey) -> Result<Option<Versioned>, StoreError>;

    /// Replace the document if its version still equals `expected`
    /// (`None` = must not exist yet). Returns the new version, or `None`
    /// when another writer got there first.
    fn compare_and_swap(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        body: &str,
    ) -> Result<Option<u64>, StoreError>;

    /// Delete the document. Missing documents are not an error.
    fn remove(&self, key: RecordKey) -> Result<(), StoreError>;
}

/// A typed document bound to its storage key.
pub trait Record: Serialize + DeserializeOwned {
    const KEY: RecordKey;
}

impl Record for SessionState {
    const KEY: RecordKey = RecordKey::Session;
}

impl Record for TestRunState {
    const KEY: RecordKey = RecordKey::TestRun;
}

impl Record for ConsultationLog {
    const KEY: RecordKey = RecordKey::Consultations;
}

impl Record for FeatureGovernanceState {
    const KEY: RecordKey = RecordKey::Governance;
}

impl Record for RecitationLog {
    const KEY: RecordKey = RecordKey::RecitationLog;
}

impl Record for LastSyncMarker {
    const KEY: RecordKey = RecordKey::LastSync;
}

impl Record for ContextUsage {
    const KEY: RecordKey = RecordKey::Context;
}

impl Record for PendingDecisions {
    const KEY: RecordKey = RecordKey::Decisions;
}
