//! # Round Allocator
//!
//! Per-round weapon allocation for retake-style team rounds, backed by a
//! write-back cache of player preferences.
//!
//! ## Layers
//! - **Cache** ([`cache`]): in-memory preferences, answers every read
//! - **Store** ([`storage`]): SQLite, reached only by hydrate and flush
//! - **Engine** ([`engine`]): tier planning, quota selection, resolution
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use allocator::{AllocatorConfig, PreferenceCache, RoundAllocator, SqliteStore};
//!
//! let config = Arc::new(AllocatorConfig::load("allocator.json")?);
//! let store = Arc::new(SqliteStore::open(&config.database.path)?);
//! let cache = Arc::new(PreferenceCache::new(store));
//! let allocator = RoundAllocator::new(config, cache);
//! # Ok::<(), String>(())
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod storage;
pub mod taxonomy;
pub mod types;
pub mod weapons;

pub use cache::{CacheHandle, CacheWorker, FlushScheduler, PreferenceCache, SchedulerConfig};
pub use config::{AccessMode, AllocatorConfig, SelectionType, TierSelectionMode};
pub use engine::{
    ItemGranter, PermissionCategory, PermissionOracle, RoundAllocationResult, RoundAllocator,
    RoundPlayer, RoundReport, RoundTierPlanner,
};
pub use storage::{
    CacheStats, CrossTeamPreference, FlushStats, MemoryStore, PreferenceRecord, PreferenceStore,
    SqliteStore, WeaponPreference,
};
pub use taxonomy::Taxonomy;
pub use types::{AllocationType, ItemSlot, PlayerId, RoundTier, Team};
pub use weapons::WeaponItem;
