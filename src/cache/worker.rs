//! Background I/O worker for the preference cache.
//!
//! The game loop only ever sends commands through a [`CacheHandle`]; every
//! store access happens on the tokio blocking pool. Commands naming the same
//! player run in the order they were sent, so a connect-time hydrate always
//! finishes before that player's disconnect flush starts. Commands for
//! different players, and bulk flushes, run concurrently.
//!
//! Completion is reported through optional oneshot channels, so callers
//! that do not care (connect-time hydration) never wait.

use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

use super::PreferenceCache;
use crate::storage::FlushStats;
use crate::types::PlayerId;

/// Work the worker performs off the game loop.
#[derive(Debug)]
pub enum CacheCommand {
    Hydrate(PlayerId),
    HydrateMany(Vec<PlayerId>),
    FlushOne(PlayerId, Option<oneshot::Sender<Result<(), String>>>),
    FlushDirty(Option<oneshot::Sender<FlushStats>>),
    Clear(Option<oneshot::Sender<FlushStats>>),
    Shutdown,
}

impl CacheCommand {
    /// Distinct players this command touches; empty for whole-cache commands.
    fn player_ids(&self) -> Vec<PlayerId> {
        match self {
            CacheCommand::Hydrate(id) | CacheCommand::FlushOne(id, _) => vec![*id],
            CacheCommand::HydrateMany(ids) => {
                let mut seen = HashSet::with_capacity(ids.len());
                ids.iter().copied().filter(|id| seen.insert(*id)).collect()
            }
            CacheCommand::FlushDirty(_) | CacheCommand::Clear(_) | CacheCommand::Shutdown => Vec::new(),
        }
    }
}

/// Cheap, cloneable sender side used by the game loop.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    cache: Arc<PreferenceCache>,
    tx: mpsc::UnboundedSender<CacheCommand>,
}

impl CacheHandle {
    /// Direct access for the in-memory operations (reads and mutations).
    pub fn cache(&self) -> &Arc<PreferenceCache> {
        &self.cache
    }

    fn send(&self, command: CacheCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!("[CacheWorker] Worker is gone, dropping {:?}", e.0);
        }
    }

    /// Player connected: load their record in the background.
    pub fn hydrate(&self, id: PlayerId) {
        if id.is_valid() {
            self.send(CacheCommand::Hydrate(id));
        }
    }

    /// Bulk load, e.g. everyone present at a session start.
    pub fn hydrate_many(&self, ids: Vec<PlayerId>) {
        if !ids.is_empty() {
            self.send(CacheCommand::HydrateMany(ids));
        }
    }

    /// Player disconnected: persist and drop their record.
    pub fn flush_one(&self, id: PlayerId) -> oneshot::Receiver<Result<(), String>> {
        let (tx, rx) = oneshot::channel();
        self.send(CacheCommand::FlushOne(id, Some(tx)));
        rx
    }

    pub fn flush_dirty(&self) -> oneshot::Receiver<FlushStats> {
        let (tx, rx) = oneshot::channel();
        self.send(CacheCommand::FlushDirty(Some(tx)));
        rx
    }

    /// Session boundary: flush everything then empty the cache.
    pub fn clear(&self) -> oneshot::Receiver<FlushStats> {
        let (tx, rx) = oneshot::channel();
        self.send(CacheCommand::Clear(Some(tx)));
        rx
    }

    /// Stops the worker after the commands already queued.
    pub fn shutdown(&self) {
        self.send(CacheCommand::Shutdown);
    }
}

/// Receiver side; run it with `tokio::spawn(worker.run())`.
pub struct CacheWorker {
    cache: Arc<PreferenceCache>,
    rx: mpsc::UnboundedReceiver<CacheCommand>,
}

impl CacheWorker {
    pub fn new(cache: Arc<PreferenceCache>) -> (CacheWorker, CacheHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = CacheWorker {
            cache: cache.clone(),
            rx,
        };
        (worker, CacheHandle { cache, tx })
    }

    /// Processes commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("[CacheWorker] Started");

        // Completion signal of the latest command per player; it fires when
        // the sender is dropped at the end of that command.
        let mut latest: HashMap<PlayerId, oneshot::Receiver<()>> = HashMap::new();

        while let Some(command) = self.rx.recv().await {
            if let CacheCommand::Shutdown = command {
                break;
            }

            latest.retain(|_, done| matches!(done.try_recv(), Err(TryRecvError::Empty)));

            let ids = command.player_ids();
            let mut predecessors = Vec::with_capacity(ids.len());
            let mut done_signals = Vec::with_capacity(ids.len());
            for id in ids {
                let (done_tx, done_rx) = oneshot::channel::<()>();
                if let Some(previous) = latest.insert(id, done_rx) {
                    predecessors.push(previous);
                }
                done_signals.push(done_tx);
            }

            let cache = self.cache.clone();
            tokio::spawn(async move {
                for previous in predecessors {
                    let _ = previous.await;
                }
                execute(cache, command).await;
                drop(done_signals);
            });
        }

        info!("[CacheWorker] Stopped");
    }
}

async fn execute(cache: Arc<PreferenceCache>, command: CacheCommand) {
    match command {
        CacheCommand::Hydrate(id) => {
            let result = tokio::task::spawn_blocking(move || cache.hydrate(id)).await;
            if let Err(e) = result {
                error!("[CacheWorker] Hydrate task for {} failed: {}", id, e);
            }
        }
        CacheCommand::HydrateMany(ids) => {
            let count = ids.len();
            match tokio::task::spawn_blocking(move || cache.hydrate_many(&ids)).await {
                Ok(Ok(inserted)) => debug!("[CacheWorker] Hydrated {}/{} players", inserted, count),
                Ok(Err(_)) => {}
                Err(e) => error!("[CacheWorker] Bulk hydrate task failed: {}", e),
            }
        }
        CacheCommand::FlushOne(id, reply) => {
            let result = tokio::task::spawn_blocking(move || cache.flush_one(id))
                .await
                .unwrap_or_else(|e| Err(format!("Flush task failed: {}", e)));
            if let Some(reply) = reply {
                let _ = reply.send(result);
            }
        }
        CacheCommand::FlushDirty(reply) => {
            match tokio::task::spawn_blocking(move || cache.flush_dirty()).await {
                Ok(stats) => {
                    if let Some(reply) = reply {
                        let _ = reply.send(stats);
                    }
                }
                Err(e) => error!("[CacheWorker] Flush task failed: {}", e),
            }
        }
        CacheCommand::Clear(reply) => match tokio::task::spawn_blocking(move || cache.clear()).await {
            Ok(stats) => {
                info!(
                    "[CacheWorker] Cache cleared: {} flushed, {} failed",
                    stats.flushed, stats.failed
                );
                if let Some(reply) = reply {
                    let _ = reply.send(stats);
                }
            }
            Err(e) => error!("[CacheWorker] Clear task failed: {}", e),
        },
        CacheCommand::Shutdown => {}
    }
}
