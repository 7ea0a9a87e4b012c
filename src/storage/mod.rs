//! Durable preference storage.
//!
//! The store is the slow tier behind the write-back cache:
//! - **Cache**: in-memory map, answers every read (<1μs)
//! - **Store**: SQLite (or in-memory for tests), written on flush (~100μs+)
//!
//! Stores are synchronous and may fail transiently; callers run them off the
//! game loop (see [`crate::cache::CacheWorker`]).

pub mod memory_store;
pub mod sqlite_store;
pub mod types;

pub use memory_store::MemoryStore;
pub use sqlite_store::SqliteStore;
pub use types::{
    CacheEntry, CacheStats, CrossTeamPreference, FlushStats, PreferenceRecord, TeamPreferences,
    WeaponPreference,
};

use crate::types::PlayerId;
use std::collections::HashMap;

/// Durable persistence keyed by player identity.
pub trait PreferenceStore: Send + Sync {
    /// Fetches one record, `Ok(None)` if the player has never been stored.
    fn get_one(&self, id: PlayerId) -> Result<Option<PreferenceRecord>, String>;

    /// Fetches many records in one round trip. Missing players are omitted.
    fn get_many(&self, ids: &[PlayerId]) -> Result<HashMap<PlayerId, PreferenceRecord>, String>;

    /// Inserts or replaces a player's record.
    fn upsert_one(&self, id: PlayerId, record: &PreferenceRecord) -> Result<(), String>;
}
