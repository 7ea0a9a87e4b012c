//! In-process preference store.
//!
//! Used by the simulator and by tests; supports switching writes and reads
//! into a failing state to exercise retry paths.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::types::PreferenceRecord;
use super::PreferenceStore;
use crate::types::PlayerId;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<PlayerId, PreferenceRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = PreferenceRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.insert(record.user_id, record);
            }
        }
        store
    }

    /// Makes every subsequent read fail until switched back.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Record as currently persisted.
    pub fn stored(&self, id: PlayerId) -> Option<PreferenceRecord> {
        self.records.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Successful and failed read calls so far.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Successful and failed write calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err("Simulated store read failure".to_string());
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryStore {
    fn get_one(&self, id: PlayerId) -> Result<Option<PreferenceRecord>, String> {
        self.check_read()?;
        Ok(self.records.read().get(&id).cloned())
    }

    fn get_many(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, PreferenceRecord>, String> {
        self.check_read()?;
        let records = self.records.read();
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id).map(|record| (*id, record.clone())))
            .collect())
    }

    fn upsert_one(&self, id: PlayerId, record: &PreferenceRecord) -> Result<(), String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(format!("Simulated store write failure for {}", id));
        }
        if id.is_valid() {
            self.records.write().insert(id, record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_failure_switches() {
        let store = MemoryStore::new();
        let record = PreferenceRecord::new(PlayerId(3));

        store.set_fail_writes(true);
        assert!(store.upsert_one(PlayerId(3), &record).is_err());
        assert!(store.stored(PlayerId(3)).is_none());

        store.set_fail_writes(false);
        store.upsert_one(PlayerId(3), &record).unwrap();
        assert_eq!(store.stored(PlayerId(3)), Some(record));

        store.set_fail_reads(true);
        assert!(store.get_one(PlayerId(3)).is_err());
        assert!(store.get_many(&[PlayerId(3)]).is_err());
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.read_count(), 2);
    }
}
