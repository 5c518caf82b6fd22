//! [`Records`] – typed access over any [`StateStore`].
//!
//! Reads never fail: a missing, unreadable, or corrupt document is reported
//! as absent so callers fall back to defaults. Writes return errors, which
//! callers log and drop.
//!
//! # Example
//!
//! ```rust
//! use hookgate_store::{MemoryStore, Records};
//! use hookgate_types::ContextUsage;
//!
//! let store = MemoryStore::new();
//! let records = Records::new(&store);
//!
//! records.update(ContextUsage::default, |c| c.tool_calls += 1).unwrap();
//! records.update(ContextUsage::default, |c| c.tool_calls += 1).unwrap();
//!
//! let usage: ContextUsage = records.read().unwrap();
//! assert_eq!(usage.tool_calls, 2);
//! ```

use tracing::{debug, warn};

use crate::{Record, RecordKey, StateStore, StoreError};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct Records<'a> {
    store: &'a dyn StateStore,
    max_attempts: u32,
}

impl<'a> Records<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Number of optimistic attempts before an update gives up.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// The stored record, or `None` when missing or unreadable.
    pub fn read<T: Record>(&self) -> Option<T> {
        match self.store.load(T::KEY) {
            Ok(Some(raw)) => decode(T::KEY, &raw.body),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %T::KEY, error = %e, "state read failed; treating record as absent");
                None
            }
        }
    }

    pub fn read_or_else<T: Record>(&self, init: impl FnOnce() -> T) -> T {
        self.read().unwrap_or_else(init)
    }

    /// Atomically apply `apply` to the record (starting from `init()` when it
    /// is missing or corrupt) and return the value that was written.
    ///
    /// `apply` may run more than once when another writer races us; it must
    /// only depend on the record it is handed.
    pub fn update<T: Record>(
        &self,
        mut init: impl FnMut() -> T,
        mut apply: impl FnMut(&mut T),
    ) -> Result<T, StoreError> {
        for attempt in 1..=self.max_attempts {
            let current = self.store.load(T::KEY)?;
            let (expected, mut value) = match current {
                Some(raw) => (
                    Some(raw.version),
                    decode(T::KEY, &raw.body).unwrap_or_else(&mut init),
                ),
                None => (None, init()),
            };
            apply(&mut value);
            let body = serde_json::to_string(&value)?;
            if self.store.compare_and_swap(T::KEY, expected, &body)?.is_some() {
                return Ok(value);
            }
            debug!(key = %T::KEY, attempt, "concurrent update detected; retrying");
        }
        Err(StoreError::Contended {
            key: T::KEY,
            attempts: self.max_attempts,
        })
    }

    /// Overwrite the record with `value`, whatever is stored.
    pub fn put<T: Record>(&self, value: &T) -> Result<(), StoreError> {
        let body = serde_json::to_string(value)?;
        for _ in 0..self.max_attempts {
            let expected = self.store.load(T::KEY)?.map(|raw| raw.version);
            if self.store.compare_and_swap(T::KEY, expected, &body)?.is_some() {
                return Ok(());
            }
        }
        Err(StoreError::Contended {
            key: T::KEY,
            attempts: self.max_attempts,
        })
    }

    pub fn reset(&self, key: RecordKey) -> Result<(), StoreError> {
        self.store.remove(key)
    }

    pub fn reset_all(&self) -> Result<(), StoreError> {
        for key in RecordKey::ALL {
            self.store.remove(key)?;
        }
        Ok(())
    }
}

fn decode<T: Record>(key: RecordKey, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%key, error = %e, "corrupt state record; treating as absent");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
