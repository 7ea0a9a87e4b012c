//! # Round Allocator Simulator
//!
//! Runs the allocator end to end against an in-memory store: players
//! connect, tweak preferences, play a number of rounds and disconnect.
//!
//! Environment:
//! - `ALLOCATOR_CONFIG`: configuration file (defaults apply if missing)
//! - `ALLOCATOR_SIM_ROUNDS`: number of rounds to play (default 10)

use allocator::cache::{CacheWorker, FlushScheduler, PreferenceCache, SchedulerConfig};
use allocator::engine::{PermissionCategory, RoundAllocator, RoundPlayer};
use allocator::storage::{CrossTeamPreference, MemoryStore, PreferenceRecord, WeaponPreference};
use allocator::types::{AllocationType, ItemSlot, PlayerId, Team};
use allocator::weapons::WeaponItem;
use allocator::AllocatorConfig;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct SimPlayer {
    id: PlayerId,
    team: Team,
    vip: bool,
}

impl RoundPlayer for SimPlayer {
    fn identity(&self) -> PlayerId {
        self.id
    }

    fn team(&self) -> Team {
        self.team
    }
}

fn sim_players() -> Vec<SimPlayer> {
    (0..10u64)
        .map(|n| SimPlayer {
            id: PlayerId(76561198000000001 + n),
            team: if n < 5 { Team::TeamA } else { Team::TeamB },
            vip: n % 3 == 0,
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=================================================");
    println!("  Round Allocator - Simulation                    ");
    println!("=================================================");
    println!();

    let config_path =
        std::env::var("ALLOCATOR_CONFIG").unwrap_or_else(|_| "./allocator.json".to_string());
    let rounds: usize = std::env::var("ALLOCATOR_SIM_ROUNDS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(10);

    println!("Loading configuration from {}...", config_path);
    let config = match AllocatorConfig::load(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("✗ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    for warning in config.validate()? {
        println!("  ! {}", warning);
    }
    println!("✓ Configuration loaded");
    println!("  - Tier selection: {:?}", config.round_types.selection);
    println!("  - Flush interval: {}s", config.cache.flush_interval_secs);
    println!();

    // One returning player already has stored preferences
    let players = sim_players();
    let mut returning = PreferenceRecord::new(players[5].id);
    returning.set_weapon_preference(
        Team::TeamB,
        AllocationType::FullBuyPrimary,
        Some(WeaponItem::AUG.into()),
    );
    returning.set_preferred(Some(WeaponItem::AWP.into()));
    let store = Arc::new(MemoryStore::with_records([returning]));

    let cache = Arc::new(PreferenceCache::new(store.clone()));
    let (worker, handle) = CacheWorker::new(cache.clone());
    let worker_task = tokio::spawn(worker.run());

    let scheduler = Arc::new(FlushScheduler::new(
        cache.clone(),
        SchedulerConfig::from(&config.cache),
    ));
    let scheduler_task = tokio::spawn(scheduler.clone().start());

    println!("Connecting {} players...", players.len());
    handle.hydrate_many(players.iter().map(|p| p.id).collect());

    cache.set_preferred_weapon(players[0].id, Some(WeaponPreference::RandomFromPool));
    cache.set_preferred_weapon(players[3].id, Some(WeaponItem::SSG08.into()));
    cache.set_weapon_preference(
        players[1].id,
        Team::TeamA,
        AllocationType::HalfBuyPrimary,
        Some(WeaponItem::MP7.into()),
    );
    cache.set_cross_team_preference(players[2].id, CrossTeamPreference::Both);
    cache.set_special_item_enabled(players[6].id, true);

    let stats = cache.stats();
    println!(
        "✓ {} players cached, {} with unsaved changes",
        stats.cached_players, stats.dirty_players
    );
    println!();

    let mut allocator = RoundAllocator::new(config.clone(), cache.clone());
    let oracle = |player: &SimPlayer, _category: PermissionCategory| player.vip;
    let mut rng = rand::thread_rng();

    for round in 1..=rounds {
        let mut granted = Vec::new();
        let mut granter = |player: &SimPlayer, items: &[WeaponItem], hint: ItemSlot| {
            let names: Vec<&str> = items.iter().map(|item| item.name()).collect();
            granted.push(format!(
                "    {} [{}] {} (equip {})",
                player.id,
                player.team.short_name(),
                names.join(", "),
                hint.slot_name()
            ));
        };

        let report = allocator.allocate_next_round(&players, &oracle, &mut granter, &mut rng);
        println!("Round {} ({}) - {}", round, report.tier, report.round_id);
        for line in granted {
            println!("{}", line);
        }

        if round == rounds / 2 {
            let flushed = handle.flush_dirty().await?;
            println!(
                "  ↳ mid-session flush: {} written, {} failed",
                flushed.flushed, flushed.failed
            );
        }
    }
    println!();

    println!("Disconnecting players...");
    for player in &players {
        if let Err(e) = handle.flush_one(player.id).await? {
            eprintln!("✗ Failed to save {}: {}", player.id, e);
        }
    }
    let cleared = handle.clear().await?;
    println!("✓ Session closed ({} late writes)", cleared.flushed);
    println!();

    println!("Statistics:");
    println!("  - Rounds played:  {}", allocator.rounds_played());
    println!("  - Stored players: {}", store.len());
    println!("  - Store writes:   {}", store.write_count());
    println!("  - Still cached:   {}", cache.stats().cached_players);
    println!();

    handle.shutdown();
    scheduler_task.abort();
    let _ = worker_task.await;

    println!("=================================================");
    println!("  Simulation Complete");
    println!("=================================================");

    Ok(())
}
