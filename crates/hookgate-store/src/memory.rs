//! Process-local [`StateStore`].
//!
//! Nothing survives the process. Used by tests and as the fail-open fallback
//! when the on-disk database cannot be opened.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::{RecordKey, StateStore, StoreError, Versioned};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, Versioned>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: RecordKey) -> Result<Option<Versioned>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(&key).cloned())
    }

    fn compare_and_swap(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        body: &str,
    ) -> Result<Option<u64>, StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        let current = records.get(&key).map(|v| v.version);
        if current != expected {
            return Ok(None);
        }
        let next = current.map_or(1, |v| v + 1);
        records.insert(
            key,
            Versioned {
                version: next,
                body: body.to_string(),
            },
        );
        Ok(Some(next))
    }

    fn remove(&self, key: RecordKey) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.remove(&key);
        Ok(())
    }
}
