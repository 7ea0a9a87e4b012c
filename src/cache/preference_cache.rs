//! Write-back preference cache.
//!
//! The cache is the authoritative copy of every connected player's
//! preferences for the duration of a session. Reads and mutations touch only
//! memory; the store is reached exclusively through hydrate and flush, which
//! callers run off the game loop.
//!
//! # Invariant
//! For any identity, either it is absent (nothing to lose), or its record
//! reflects every mutation since it was hydrated or created, and an
//! unflushed mutation keeps it dirty until a store write succeeds.
//!
//! # Locking
//! - `entries` is held only for in-memory work, never across store I/O
//! - `write_gate` serializes store writes so an older snapshot can never land
//!   after a newer one for the same identity
//! - `removals` is taken after `entries`, never before
//!
//! # Stale loads
//! A load that read the store before a disconnect flush wrote newer data must
//! not put its snapshot back. Every removal is stamped with a sequence number
//! while loads are in flight, and a load only inserts if its identity was not
//! removed after the load began.

use log::{debug, error};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::storage::{
    CacheEntry, CacheStats, CrossTeamPreference, FlushStats, PreferenceRecord, PreferenceStore,
    WeaponPreference,
};
use crate::types::{now_ms, AllocationType, PlayerId, Team};

pub struct PreferenceCache {
    /// Live entries keyed by player
    entries: RwLock<HashMap<PlayerId, CacheEntry>>,

    /// Durable store behind the cache
    store: Arc<dyn PreferenceStore>,

    /// Held for the duration of any store write pass
    write_gate: Mutex<()>,

    /// Removals seen by in-flight loads
    removals: Mutex<RemovalLog>,
}

#[derive(Debug, Default)]
struct RemovalLog {
    seq: u64,
    loads_in_flight: usize,
    /// Sequence number of the latest removal per identity, kept only while a load runs
    removed_at: HashMap<PlayerId, u64>,
}

/// Marks one store load in flight; the removal log is emptied once none remain.
struct LoadGuard<'a> {
    removals: &'a Mutex<RemovalLog>,
    started_at: u64,
}

impl<'a> LoadGuard<'a> {
    fn begin(removals: &'a Mutex<RemovalLog>) -> Self {
        let mut log = removals.lock();
        log.loads_in_flight += 1;
        Self {
            removals,
            started_at: log.seq,
        }
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut log = self.removals.lock();
        log.loads_in_flight -= 1;
        if log.loads_in_flight == 0 {
            log.removed_at.clear();
        }
    }
}

impl std::fmt::Debug for PreferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("PreferenceCache")
            .field("cached_players", &stats.cached_players)
            .field("dirty_players", &stats.dirty_players)
            .finish()
    }
}

impl PreferenceCache {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            store,
            write_gate: Mutex::new(()),
            removals: Mutex::new(RemovalLog::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    // ============================================================================================
    // READS
    // ============================================================================================

    /// Cached record for `id`, without ever touching the store.
    pub fn get(&self, id: PlayerId) -> Option<PreferenceRecord> {
        if !id.is_valid() {
            return None;
        }
        self.entries.read().get(&id).map(|entry| entry.record.clone())
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.entries.read().contains_key(&id)
    }

    /// Cached records for every id present; absent ids are omitted.
    pub fn get_cached(&self, ids: &[PlayerId]) -> HashMap<PlayerId, PreferenceRecord> {
        let entries = self.entries.read();
        ids.iter()
            .filter(|id| id.is_valid())
            .filter_map(|id| entries.get(id).map(|entry| (*id, entry.record.clone())))
            .collect()
    }

    /// Returns the cached record, inserting a blank one if absent.
    ///
    /// The identity `0` gets a throwaway blank record that is never inserted.
    pub fn get_or_create(&self, id: PlayerId) -> PreferenceRecord {
        if !id.is_valid() {
            return PreferenceRecord::new(id);
        }
        self.entries
            .write()
            .entry(id)
            .or_insert_with(|| CacheEntry::clean(PreferenceRecord::new(id)))
            .record
            .clone()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        CacheStats {
            cached_players: entries.len(),
            dirty_players: entries.values().filter(|entry| entry.dirty).count(),
        }
    }

    /// Identities holding unflushed changes.
    pub fn dirty_ids(&self) -> HashSet<PlayerId> {
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(id, _)| *id)
            .collect()
    }

    // ============================================================================================
    // MUTATIONS
    // ============================================================================================

    /// Applies `mutation` to the (possibly new) record and marks it dirty.
    fn mutate<F>(&self, id: PlayerId, mutation: F)
    where
        F: FnOnce(&mut PreferenceRecord),
    {
        if !id.is_valid() {
            return;
        }

        let mut entries = self.entries.write();
        let entry = entries
            .entry(id)
            .or_insert_with(|| CacheEntry::clean(PreferenceRecord::new(id)));
        mutation(&mut entry.record);
        entry.mark_dirty();
    }

    pub fn set_weapon_preference(
        &self,
        id: PlayerId,
        team: Team,
        allocation_type: AllocationType,
        preference: Option<WeaponPreference>,
    ) {
        self.mutate(id, |record| {
            record.set_weapon_preference(team, allocation_type, preference)
        });
    }

    /// Sets the preferred (sniper) slot for both teams.
    pub fn set_preferred_weapon(&self, id: PlayerId, preference: Option<WeaponPreference>) {
        self.mutate(id, |record| record.set_preferred(preference));
    }

    pub fn set_special_item_enabled(&self, id: PlayerId, enabled: bool) {
        self.mutate(id, |record| record.special_item_enabled = enabled);
    }

    pub fn set_cross_team_preference(&self, id: PlayerId, preference: CrossTeamPreference) {
        self.mutate(id, |record| record.cross_team = preference);
    }

    pub fn clear_weapon_preferences(&self, id: PlayerId) {
        self.mutate(id, |record| record.clear_weapon_preferences());
    }

    // ============================================================================================
    // HYDRATION
    // ============================================================================================

    /// Inserts a loaded `record` unless an entry exists or `id` was removed
    /// after the load started.
    fn insert_loaded(&self, id: PlayerId, record: PreferenceRecord, load: &LoadGuard<'_>) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return false;
        }

        let removed_since = self
            .removals
            .lock()
            .removed_at
            .get(&id)
            .map_or(false, |removed| *removed > load.started_at);
        if removed_since {
            debug!("[Cache] Dropping stale load for player {}, removed during read", id);
            return false;
        }

        entries.insert(id, CacheEntry::clean(record));
        true
    }

    /// Drops `id` from `entries` and stamps the removal for in-flight loads.
    fn remove_entry(&self, entries: &mut HashMap<PlayerId, CacheEntry>, id: PlayerId) {
        if entries.remove(&id).is_none() {
            return;
        }
        let mut log = self.removals.lock();
        log.seq += 1;
        if log.loads_in_flight > 0 {
            let seq = log.seq;
            log.removed_at.insert(id, seq);
        }
    }

    /// Loads one player from the store.
    ///
    /// Never overwrites an existing entry: a mutation made while the load was
    /// in flight wins. A player flushed out of the cache during the read is
    /// not reinserted. A player unknown to the store gets a blank record. On
    /// store failure the cache is left untouched.
    ///
    /// # Returns
    /// `Ok(true)` if an entry was inserted, `Ok(false)` otherwise.
    pub fn hydrate(&self, id: PlayerId) -> Result<bool, String> {
        if !id.is_valid() || self.contains(id) {
            return Ok(false);
        }

        let load = LoadGuard::begin(&self.removals);
        let record = match self.store.get_one(id) {
            Ok(record) => record,
            Err(e) => {
                error!("[Cache] Failed to load settings for {}: {}", id, e);
                return Err(e);
            }
        };

        let found = record.is_some();
        let inserted = self.insert_loaded(id, record.unwrap_or_else(|| PreferenceRecord::new(id)), &load);
        if inserted {
            if found {
                debug!("[Cache] Loaded settings for player {}", id);
            } else {
                debug!("[Cache] Created new settings for player {}", id);
            }
        }
        Ok(inserted)
    }

    /// Batched [`hydrate`](Self::hydrate): one multi-get for the ids not yet cached.
    ///
    /// # Returns
    /// Number of entries inserted.
    pub fn hydrate_many(&self, ids: &[PlayerId]) -> Result<usize, String> {
        let load = LoadGuard::begin(&self.removals);
        let to_load: Vec<PlayerId> = {
            let entries = self.entries.read();
            let mut seen = HashSet::new();
            ids.iter()
                .copied()
                .filter(|id| id.is_valid() && !entries.contains_key(id) && seen.insert(*id))
                .collect()
        };

        if to_load.is_empty() {
            return Ok(0);
        }

        let mut found = match self.store.get_many(&to_load) {
            Ok(found) => found,
            Err(e) => {
                error!("[Cache] Failed to bulk load {} players: {}", to_load.len(), e);
                return Err(e);
            }
        };

        let loaded = found.len();
        let mut inserted = 0;
        for id in to_load.iter().copied() {
            let record = found.remove(&id).unwrap_or_else(|| PreferenceRecord::new(id));
            if self.insert_loaded(id, record, &load) {
                inserted += 1;
            }
        }

        debug!(
            "[Cache] Bulk loaded {} players, created {} new",
            loaded,
            to_load.len() - loaded
        );
        Ok(inserted)
    }

    // ============================================================================================
    // FLUSHING
    // ============================================================================================

    /// Writes every dirty entry to the store.
    ///
    /// Only one flush runs at a time: a caller arriving while another pass is
    /// in progress returns immediately with `skipped` set, and the changes it
    /// would have written stay dirty for the next pass. Failed writes re-mark
    /// their entry dirty.
    pub fn flush_dirty(&self) -> FlushStats {
        let _gate = match self.write_gate.try_lock() {
            Some(gate) => gate,
            None => {
                debug!("[Cache] Flush already in progress, skipping");
                return FlushStats {
                    skipped: true,
                    ..Default::default()
                };
            }
        };

        let start = now_ms();

        // Drain under the lock, write without it
        let pending: Vec<(PlayerId, PreferenceRecord)> = {
            let mut entries = self.entries.write();
            entries
                .iter_mut()
                .filter(|(_, entry)| entry.dirty)
                .map(|(id, entry)| {
                    entry.dirty = false;
                    (*id, entry.record.clone())
                })
                .collect()
        };

        if pending.is_empty() {
            return FlushStats::default();
        }

        debug!("[Cache] Flushing {} dirty players to database", pending.len());

        let mut stats = FlushStats::default();
        for (id, record) in pending {
            match self.store.upsert_one(id, &record) {
                Ok(()) => stats.flushed += 1,
                Err(e) => {
                    error!("[Cache] Failed to flush player {}: {}", id, e);
                    if let Some(entry) = self.entries.write().get_mut(&id) {
                        entry.dirty = true;
                    }
                    stats.failed += 1;
                }
            }
        }

        stats.duration_ms = now_ms() - start;
        debug!(
            "[Cache] Successfully flushed {}/{} players",
            stats.flushed,
            stats.flushed + stats.failed
        );
        stats
    }

    /// Writes one player and drops them from the cache (disconnect path).
    ///
    /// Waits for any bulk flush in progress. The entry stays readable while
    /// the write runs. It is dropped only if no mutation landed meanwhile;
    /// otherwise the newer state stays cached and dirty. On failure the entry
    /// stays cached and dirty and the error is returned.
    pub fn flush_one(&self, id: PlayerId) -> Result<(), String> {
        if !id.is_valid() {
            return Ok(());
        }

        let _gate = self.write_gate.lock();

        let (record, version) = {
            let mut entries = self.entries.write();
            let snapshot = entries
                .get(&id)
                .map(|entry| (entry.dirty, entry.record.clone(), entry.version));
            match snapshot {
                None => return Ok(()),
                Some((false, _, _)) => {
                    self.remove_entry(&mut entries, id);
                    debug!("[Cache] Removed clean player {} from cache", id);
                    return Ok(());
                }
                Some((true, record, version)) => (record, version),
            }
        };

        match self.store.upsert_one(id, &record) {
            Ok(()) => {
                let mut entries = self.entries.write();
                if entries.get(&id).map_or(false, |entry| entry.version == version) {
                    self.remove_entry(&mut entries, id);
                    debug!("[Cache] Flushed and removed player {} from cache", id);
                } else {
                    debug!("[Cache] Flushed player {}, newer changes stay cached", id);
                }
                Ok(())
            }
            Err(e) => {
                error!("[Cache] Failed to flush player {} on disconnect: {}", id, e);
                if let Some(entry) = self.entries.write().get_mut(&id) {
                    entry.dirty = true;
                }
                Err(e)
            }
        }
    }

    /// Flushes everything dirty, then empties the cache (session boundary).
    ///
    /// Entries whose write fails, and entries mutated while the pass ran, stay
    /// cached and dirty so nothing is lost.
    pub fn clear(&self) -> FlushStats {
        let _gate = self.write_gate.lock();
        let start = now_ms();

        let snapshot: Vec<(PlayerId, Option<PreferenceRecord>, u64)> = self
            .entries
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.dirty.then(|| entry.record.clone()), entry.version))
            .collect();

        let mut stats = FlushStats::default();
        let mut retire = Vec::with_capacity(snapshot.len());
        for (id, record, version) in snapshot {
            let record = match record {
                Some(record) => record,
                None => {
                    retire.push((id, version));
                    continue;
                }
            };
            match self.store.upsert_one(id, &record) {
                Ok(()) => {
                    stats.flushed += 1;
                    retire.push((id, version));
                }
                Err(e) => {
                    error!("[Cache] Failed to flush player {} while clearing: {}", id, e);
                    if let Some(entry) = self.entries.write().get_mut(&id) {
                        entry.dirty = true;
                    }
                    stats.failed += 1;
                }
            }
        }

        let mut entries = self.entries.write();
        for (id, version) in retire {
            if entries.get(&id).map_or(false, |entry| entry.version == version) {
                self.remove_entry(&mut entries, id);
            }
        }
        let kept = entries.len();
        drop(entries);

        stats.duration_ms = now_ms() - start;
        debug!(
            "[Cache] Cache cleared ({} flushed, {} failed, {} kept)",
            stats.flushed, stats.failed, kept
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::weapons::WeaponItem;

    fn cache_with_store() -> (PreferenceCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PreferenceCache::new(store.clone()), store)
    }

    #[test]
    fn test_invalid_identity_is_a_no_op() {
        let (cache, store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId::INVALID, true);
        cache.set_weapon_preference(
            PlayerId::INVALID,
            Team::TeamA,
            AllocationType::FullBuyPrimary,
            Some(WeaponItem::AK47.into()),
        );
        assert_eq!(cache.stats().cached_players, 0);
        assert!(cache.get(PlayerId::INVALID).is_none());
        assert_eq!(cache.get_or_create(PlayerId::INVALID).user_id, PlayerId::INVALID);
        assert_eq!(cache.stats().cached_players, 0);
        assert_eq!(cache.hydrate(PlayerId::INVALID), Ok(false));
        assert!(cache.flush_one(PlayerId::INVALID).is_ok());
        assert_eq!(store.read_count(), 0);
    }

    #[test]
    fn test_mutation_creates_dirty_entry() {
        let (cache, _store) = cache_with_store();
        let id = PlayerId(10);
        cache.set_cross_team_preference(id, CrossTeamPreference::Both);
        assert_eq!(cache.get(id).unwrap().cross_team, CrossTeamPreference::Both);
        assert!(cache.dirty_ids().contains(&id));
    }

    #[test]
    fn test_get_or_create_is_clean() {
        let (cache, _store) = cache_with_store();
        let record = cache.get_or_create(PlayerId(4));
        assert_eq!(record, PreferenceRecord::new(PlayerId(4)));
        assert!(cache.contains(PlayerId(4)));
        assert_eq!(cache.stats().dirty_players, 0);
    }

    #[test]
    fn test_hydrate_loads_or_creates_blank() {
        let mut stored = PreferenceRecord::new(PlayerId(1));
        stored.special_item_enabled = true;
        let store = Arc::new(MemoryStore::with_records([stored.clone()]));
        let cache = PreferenceCache::new(store.clone());

        assert_eq!(cache.hydrate(PlayerId(1)), Ok(true));
        assert_eq!(cache.get(PlayerId(1)), Some(stored));

        assert_eq!(cache.hydrate(PlayerId(2)), Ok(true));
        assert_eq!(cache.get(PlayerId(2)), Some(PreferenceRecord::new(PlayerId(2))));
        assert_eq!(cache.stats().dirty_players, 0);

        // Second hydrate is a no-op and does not hit the store
        let reads = store.read_count();
        assert_eq!(cache.hydrate(PlayerId(1)), Ok(false));
        assert_eq!(store.read_count(), reads);
    }

    #[test]
    fn test_hydrate_failure_leaves_cache_unchanged() {
        let (cache, store) = cache_with_store();
        store.set_fail_reads(true);
        assert!(cache.hydrate(PlayerId(9)).is_err());
        assert!(cache.get(PlayerId(9)).is_none());
        assert!(cache.hydrate_many(&[PlayerId(9), PlayerId(10)]).is_err());
        assert_eq!(cache.stats().cached_players, 0);
    }

    #[test]
    fn test_hydrate_many_skips_cached_and_duplicates() {
        let store = Arc::new(MemoryStore::with_records([PreferenceRecord::new(PlayerId(2))]));
        let cache = PreferenceCache::new(store.clone());
        cache.set_special_item_enabled(PlayerId(1), true);

        let inserted = cache
            .hydrate_many(&[PlayerId(1), PlayerId(2), PlayerId(2), PlayerId(3), PlayerId::INVALID])
            .unwrap();
        assert_eq!(inserted, 2);
        assert!(cache.get(PlayerId(1)).unwrap().special_item_enabled);
        assert_eq!(cache.stats().cached_players, 3);
        assert_eq!(store.read_count(), 1);
    }

    #[test]
    fn test_flush_dirty_persists_and_cleans() {
        let (cache, store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId(1), true);
        cache.set_special_item_enabled(PlayerId(2), true);
        cache.get_or_create(PlayerId(3));

        let stats = cache.flush_dirty();
        assert_eq!(stats.flushed, 2);
        assert_eq!(stats.failed, 0);
        assert!(!stats.skipped);
        assert!(cache.dirty_ids().is_empty());
        assert!(store.stored(PlayerId(1)).unwrap().special_item_enabled);
        assert!(store.stored(PlayerId(3)).is_none());

        // Nothing dirty: no writes
        let writes = store.write_count();
        assert_eq!(cache.flush_dirty(), FlushStats::default());
        assert_eq!(store.write_count(), writes);
    }

    #[test]
    fn test_flush_one_failure_reinserts_dirty() {
        let (cache, store) = cache_with_store();
        let id = PlayerId(77);
        cache.set_special_item_enabled(id, true);

        store.set_fail_writes(true);
        assert!(cache.flush_one(id).is_err());
        assert!(cache.get(id).unwrap().special_item_enabled);
        assert!(cache.dirty_ids().contains(&id));

        store.set_fail_writes(false);
        assert!(cache.flush_one(id).is_ok());
        assert!(cache.get(id).is_none());
        assert!(store.stored(id).unwrap().special_item_enabled);
    }

    #[test]
    fn test_flush_one_clean_entry_skips_write() {
        let store = Arc::new(MemoryStore::with_records([PreferenceRecord::new(PlayerId(5))]));
        let cache = PreferenceCache::new(store.clone());
        cache.hydrate(PlayerId(5)).unwrap();

        cache.flush_one(PlayerId(5)).unwrap();
        assert!(!cache.contains(PlayerId(5)));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_flush_skipped_while_gate_held() {
        let (cache, store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId(1), true);

        let gate = cache.write_gate.lock();
        let stats = cache.flush_dirty();
        assert!(stats.skipped);
        drop(gate);

        assert!(cache.dirty_ids().contains(&PlayerId(1)));
        assert_eq!(store.write_count(), 0);
        assert_eq!(cache.flush_dirty().flushed, 1);
    }

    #[test]
    fn test_clear_flushes_then_empties() {
        let (cache, store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId(1), true);
        cache.get_or_create(PlayerId(2));

        let stats = cache.clear();
        assert_eq!(stats.flushed, 1);
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(store.stored(PlayerId(1)).is_some());
    }

    #[test]
    fn test_load_started_before_removal_is_dropped() {
        let (cache, _store) = cache_with_store();
        let id = PlayerId(12);

        let load = LoadGuard::begin(&cache.removals);
        cache.set_special_item_enabled(id, true);
        cache.flush_one(id).unwrap();
        assert!(!cache.insert_loaded(id, PreferenceRecord::new(id), &load));
        assert!(!cache.contains(id));

        // A load that starts after the removal is accepted
        let fresh = LoadGuard::begin(&cache.removals);
        assert!(cache.insert_loaded(id, PreferenceRecord::new(id), &fresh));
        drop(fresh);
        drop(load);
        assert!(cache.removals.lock().removed_at.is_empty());
    }

    #[test]
    fn test_removals_not_logged_without_loads() {
        let (cache, _store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId(1), true);
        cache.flush_one(PlayerId(1)).unwrap();
        cache.get_or_create(PlayerId(2));
        cache.clear();
        assert!(cache.removals.lock().removed_at.is_empty());
        assert_eq!(cache.removals.lock().seq, 2);
    }

    #[test]
    fn test_clear_keeps_entries_that_failed() {
        let (cache, store) = cache_with_store();
        cache.set_special_item_enabled(PlayerId(1), true);
        cache.get_or_create(PlayerId(2));
        store.set_fail_writes(true);

        let stats = cache.clear();
        assert_eq!(stats.failed, 1);
        assert!(cache.contains(PlayerId(1)));
        assert!(!cache.contains(PlayerId(2)));
        assert!(cache.dirty_ids().contains(&PlayerId(1)));
    }
}
