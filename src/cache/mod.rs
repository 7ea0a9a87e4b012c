//! Preference cache - in-memory tier with background write-back.
//!
//! - [`PreferenceCache`]: authoritative in-session copy, read by the round engine
//! - [`CacheWorker`] / [`CacheHandle`]: hydrate and flush off the game loop
//! - [`FlushScheduler`]: periodic flush of dirty entries (120s default)

pub mod preference_cache;
pub mod scheduler;
pub mod worker;

pub use preference_cache::PreferenceCache;
pub use scheduler::{FlushScheduler, SchedulerConfig};
pub use worker::{CacheCommand, CacheHandle, CacheWorker};
