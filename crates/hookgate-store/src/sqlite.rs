//! SQLite-backed [`StateStore`].
//!
//! # Storage layout
//!
//! A single table `records` is created (if it does not already exist):
//!
//! | column     | type    | description                              |
//! |------------|---------|------------------------------------------|
//! | key        | TEXT    | [`RecordKey`] name, primary key          |
//! | version    | INTEGER | starts at 1, +1 on every write           |
//! | body       | TEXT    | the record serialized as JSON            |
//! | updated_at | TEXT    | RFC-3339 time of the last write (UTC)    |
//!
//! Compare-and-swap runs inside `BEGIN IMMEDIATE`, so concurrent processes
//! sharing the file serialize on SQLite's write lock. Waiting for that lock
//! is bounded by the busy timeout given to [`SqliteStore::open`].
//!
//! # Example
//!
//! ```rust
//! use hookgate_store::{RecordKey, SqliteStore, StateStore};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! let v1 = store.compare_and_swap(RecordKey::LastSync, None, "{}").unwrap();
//! assert_eq!(v1, Some(1));
//!
//! // A writer holding a stale version loses.
//! assert_eq!(store.compare_and_swap(RecordKey::LastSync, None, "{}").unwrap(), None);
//! ```

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::{RecordKey, StateStore, StoreError, Versioned};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            // A missing directory surfaces as an open error just below.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let store = Self { conn };
        store.init_schema()?;
        debug!(path = %path.display(), "state store opened");
        Ok(store)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                key        TEXT NOT NULL PRIMARY KEY,
                version    INTEGER NOT NULL,
                body       TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn current_version(&self, key: RecordKey) -> Result<Option<u64>, StoreError> {
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM records WHERE key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|v| v as u64))
    }

    /// The body of the swap; must run inside an open transaction.
    fn swap_locked(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        body: &str,
    ) -> Result<Option<u64>, StoreError> {
        let current = self.current_version(key)?;
        if current != expected {
            debug!(%key, ?current, ?expected, "version conflict");
            return Ok(None);
        }
        let now = Utc::now().to_rfc3339();
        let next = current.map_or(1, |v| v + 1);
        self.conn.execute(
            "INSERT INTO records (key, version, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                version = excluded.version,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![key.as_str(), next as i64, body, now],
        )?;
        Ok(Some(next))
    }
}

impl StateStore for SqliteStore {
    fn load(&self, key: RecordKey) -> Result<Option<Versioned>, StoreError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT version, body FROM records WHERE key = ?1",
                params![key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(version, body)| Versioned {
            version: version as u64,
            body,
        }))
    }

    fn compare_and_swap(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        body: &str,
    ) -> Result<Option<u64>, StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = self
            .swap_locked(key, expected, body)
            .and_then(|v| {
                self.conn.execute_batch("COMMIT")?;
                Ok(v)
            });
        if result.is_err() {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        result
    }

    fn remove(&self, key: RecordKey) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM records WHERE key = ?1", params![key.as_str()])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_record_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load(RecordKey::Session).unwrap().is_none());
    }

    #[test]
    fn swap_creates_then_bumps_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(
            store.compare_and_swap(RecordKey::Session, None, "{\"a\":1}").unwrap(),
            Some(1)
        );
        assert_eq!(
            store.compare_and_swap(RecordKey::Session, Some(1), "{\"a\":2}").unwrap(),
            Some(2)
        );
        let loaded = store.load(RecordKey::Session).unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.body, "{\"a\":2}");
    }

    #[test]
    fn stale_version_is_rejected_without_writing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.compare_and_swap(RecordKey::TestRun, None, "first").unwrap();
        store.compare_and_swap(RecordKey::TestRun, Some(1), "second").unwrap();
        assert_eq!(
            store.compare_and_swap(RecordKey::TestRun, Some(1), "lost").unwrap(),
            None
        );
        assert_eq!(store.load(RecordKey::TestRun).unwrap().unwrap().body, "second");
    }

    #[test]
    fn records_are_independent() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.compare_and_swap(RecordKey::Session, None, "s").unwrap();
        assert!(store.load(RecordKey::Governance).unwrap().is_none());
        assert_eq!(
            store.compare_and_swap(RecordKey::Governance, None, "g").unwrap(),
            Some(1)
        );
    }

    #[test]
    fn remove_then_recreate_restarts_versioning() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.compare_and_swap(RecordKey::LastSync, None, "x").unwrap();
        store.remove(RecordKey::LastSync).unwrap();
        store.remove(RecordKey::LastSync).unwrap();
        assert!(store.load(RecordKey::LastSync).unwrap().is_none());
        assert_eq!(
            store.compare_and_swap(RecordKey::LastSync, None, "y").unwrap(),
            Some(1)
        );
    }

    #[test]
    fn file_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hookgate.db");
        {
            let store = SqliteStore::open(&path, Duration::from_millis(250)).unwrap();
            store.compare_and_swap(RecordKey::Context, None, "{}").unwrap();
        }
        let reopened = SqliteStore::open(&path, Duration::from_millis(250)).unwrap();
        assert_eq!(reopened.load(RecordKey::Context).unwrap().unwrap().version, 1);
    }
}
