//! Scheduled flush service - background task for periodic write-back.
//!
//! Every `flush_interval` the scheduler writes all dirty preference entries
//! to the store. The write runs on the blocking pool so the game loop is
//! never stalled by storage latency.
//!
//! # Interaction with other flushes
//!
//! A tick that lands while another flush is still running (a slow previous
//! tick, or a session-boundary clear) is skipped by the cache itself; the
//! entries stay dirty and are picked up by the next tick.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};

use super::PreferenceCache;
use crate::config::CacheConfig;
use crate::storage::FlushStats;
use crate::types::now_ms;
use log::{debug, error, info};

/// Configuration for the scheduled flush service.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between flush operations
    pub flush_interval: Duration,
    /// Whether the scheduler is enabled
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(120),
            enabled: true,
        }
    }
}

impl From<&CacheConfig> for SchedulerConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            flush_interval: Duration::from_secs(config.flush_interval_secs.max(1)),
            enabled: config.periodic_flush_enabled,
        }
    }
}

/// Scheduler for periodic flushes of dirty preferences.
pub struct FlushScheduler {
    cache: Arc<PreferenceCache>,
    config: SchedulerConfig,
    /// Timestamp of the last flush that completed without failures
    last_flush_at: Arc<RwLock<u64>>,
}

impl FlushScheduler {
    /// Creates a new flush scheduler.
    ///
    /// # Arguments
    /// - `cache`: the cache whose dirty entries are flushed
    /// - `config`: interval and enabled state
    pub fn new(cache: Arc<PreferenceCache>, config: SchedulerConfig) -> Self {
        Self {
            cache,
            config,
            last_flush_at: Arc::new(RwLock::new(now_ms())),
        }
    }

    /// Milliseconds since UNIX epoch of the last clean flush, or creation
    /// time if none has completed yet.
    pub fn last_flush(&self) -> u64 {
        *self.last_flush_at.read()
    }

    /// Starts the scheduler background task.
    ///
    /// Runs until the task is aborted. Returns immediately when disabled.
    /// The first flush happens one full interval after start.
    ///
    /// # Example
    /// ```rust,ignore
    /// let scheduler = Arc::new(FlushScheduler::new(cache, SchedulerConfig::default()));
    /// tokio::spawn(scheduler.clone().start());
    /// ```
    pub async fn start(self: Arc<Self>) {
        if !self.config.enabled {
            info!("Periodic preference flush is disabled, skipping");
            return;
        }

        info!(
            "Starting periodic preference flush with {}-second interval",
            self.config.flush_interval.as_secs()
        );

        let period = self.config.flush_interval;
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            ticker.tick().await;
            self.do_flush().await;
        }
    }

    /// Executes one flush cycle and logs the outcome. Errors never stop the
    /// scheduler.
    pub async fn do_flush(&self) -> Option<FlushStats> {
        let cache = self.cache.clone();
        match tokio::task::spawn_blocking(move || cache.flush_dirty()).await {
            Ok(stats) if stats.skipped => {
                debug!("Scheduled flush skipped, another flush is running");
                Some(stats)
            }
            Ok(stats) => {
                if stats.failed == 0 {
                    if stats.flushed > 0 {
                        info!(
                            "Scheduled flush completed: {} players written in {}ms",
                            stats.flushed, stats.duration_ms
                        );
                    }
                    *self.last_flush_at.write() = now_ms();
                } else {
                    error!(
                        "Scheduled flush incomplete: {} written, {} failed and kept dirty",
                        stats.flushed, stats.failed
                    );
                }
                Some(stats)
            }
            Err(e) => {
                error!("Scheduled flush task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::PlayerId;

    #[test]
    fn test_scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.flush_interval.as_secs(), 120);
    }

    #[test]
    fn test_scheduler_config_from_cache_config() {
        let config = SchedulerConfig::from(&CacheConfig {
            flush_interval_secs: 30,
            periodic_flush_enabled: false,
        });
        assert!(!config.enabled);
        assert_eq!(config.flush_interval.as_secs(), 30);
    }

    #[tokio::test]
    async fn test_do_flush_writes_dirty_entries() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(PreferenceCache::new(store.clone()));
        cache.set_special_item_enabled(PlayerId(3), true);

        let scheduler = FlushScheduler::new(cache.clone(), SchedulerConfig::default());
        let stats = scheduler.do_flush().await.unwrap();
        assert_eq!(stats.flushed, 1);
        assert!(store.stored(PlayerId(3)).is_some());
        assert_eq!(cache.stats().dirty_players, 0);
    }

    #[tokio::test]
    async fn test_do_flush_failure_keeps_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(PreferenceCache::new(store.clone()));
        cache.set_special_item_enabled(PlayerId(3), true);
        store.set_fail_writes(true);

        let scheduler = FlushScheduler::new(cache.clone(), SchedulerConfig::default());
        let before = scheduler.last_flush();
        let stats = scheduler.do_flush().await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(scheduler.last_flush(), before);
        assert_eq!(cache.stats().dirty_players, 1);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns() {
        let cache = Arc::new(PreferenceCache::new(Arc::new(MemoryStore::new())));
        let scheduler = Arc::new(FlushScheduler::new(
            cache,
            SchedulerConfig {
                flush_interval: Duration::from_secs(1),
                enabled: false,
            },
        ));
        scheduler.start().await;
    }
}
