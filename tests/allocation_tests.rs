//! Integration tests for round allocation.
//!
//! Tests verify:
//! - Per-team quota caps over many randomized rounds
//! - Minimum team population gate
//! - Deterministic grants when only defaults are enabled
//! - Fallback chain behavior when the usable list changes
//! - Rounds still complete while the store is unreachable

use allocator::config::{AccessMode, SelectionType};
use allocator::engine::{
    select_players, PermissionCategory, PreferenceResolver, QuotaSettings, RoundAllocator, RoundPlayer,
    RoundReport,
};
use allocator::storage::{MemoryStore, PreferenceRecord, WeaponPreference};
use allocator::taxonomy::{is_valid_for_tier, Taxonomy};
use allocator::types::{AllocationType, ItemSlot, PlayerId, RoundTier, Team};
use allocator::weapons::WeaponItem;
use allocator::{AllocatorConfig, PreferenceCache};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
struct TestPlayer {
    id: u64,
    team: Team,
    vip: bool,
}

impl RoundPlayer for TestPlayer {
    fn identity(&self) -> PlayerId {
        PlayerId(self.id)
    }

    fn team(&self) -> Team {
        self.team
    }
}

fn vip_oracle(player: &TestPlayer, _category: PermissionCategory) -> bool {
    player.vip
}

/// `count` players per team, ids starting at 1; every other player is VIP.
fn lineup(count: u64) -> Vec<TestPlayer> {
    (0..count * 2)
        .map(|n| TestPlayer {
            id: n + 1,
            team: if n < count { Team::TeamA } else { Team::TeamB },
            vip: n % 2 == 0,
        })
        .collect()
}

fn awp_lovers(players: &[TestPlayer]) -> Arc<MemoryStore> {
    let records = players.iter().map(|p| {
        let mut record = PreferenceRecord::new(PlayerId(p.id));
        record.set_preferred(Some(WeaponItem::AWP.into()));
        record
    });
    Arc::new(MemoryStore::with_records(records))
}

fn build(config: AllocatorConfig, store: Arc<MemoryStore>) -> RoundAllocator {
    let cache = Arc::new(PreferenceCache::new(store));
    RoundAllocator::new(Arc::new(config), cache)
}

fn play(
    allocator: &mut RoundAllocator,
    players: &[TestPlayer],
    tier: RoundTier,
    rng: &mut StdRng,
) -> (RoundReport, Vec<(u64, Vec<WeaponItem>, ItemSlot)>) {
    let mut grants = Vec::new();
    let mut granter = |p: &TestPlayer, items: &[WeaponItem], hint: ItemSlot| {
        grants.push((p.id, items.to_vec(), hint));
    };
    let report = allocator.allocate(players, tier, &vip_oracle, &mut granter, rng);
    (report, grants)
}

// ============================================================================
// QUOTAS
// ============================================================================

#[test]
fn test_quota_never_exceeded_everyone() {
    let players = lineup(5);
    let mut config = AllocatorConfig::default();
    config.awp.enable = 1;
    config.awp.max_per_team = HashMap::from([(Team::TeamA, 2), (Team::TeamB, 1)]);
    let mut allocator = build(config, awp_lovers(&players));
    let mut rng = StdRng::seed_from_u64(1);

    let mut granted_a = 0;
    for _ in 0..1000 {
        let (report, _) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
        assert!(report.preferred_count(Team::TeamA) <= 2);
        assert!(report.preferred_count(Team::TeamB) <= 1);
        assert!(report.item_count(Team::TeamA, WeaponItem::AWP) <= 2);
        granted_a += report.preferred_count(Team::TeamA);
    }
    // Five eligible players and a quota of two: the quota is always filled
    assert_eq!(granted_a, 2000);
}

#[test]
fn test_quota_never_exceeded_vip_only() {
    let players = lineup(6);
    let mut config = AllocatorConfig::default();
    config.awp.enable = 2;
    config.awp.chance = 50.0;
    config.awp.max_per_team = HashMap::from([(Team::TeamA, 2), (Team::TeamB, 2)]);
    let mut allocator = build(config, awp_lovers(&players));
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..1000 {
        let (report, _) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
        for team in Team::PLAYING {
            assert!(report.preferred_count(team) <= 2);
        }
        for result in report.results.iter().filter(|r| r.preferred_granted) {
            let player = players.iter().find(|p| PlayerId(p.id) == result.player).unwrap();
            assert!(player.vip, "non-VIP {} received a scarce item", player.id);
        }
    }
}

#[test]
fn test_selector_quota_over_random_pools() {
    let mut rng = StdRng::seed_from_u64(3);
    for mode in [AccessMode::Everyone, AccessMode::VipOnly] {
        for trial in 0..1000usize {
            let pool: Vec<u32> = (0..(trial % 12) as u32).collect();
            let settings = QuotaSettings {
                mode,
                per_team_max: trial % 4,
                min_team_population: 0,
            };
            let selected = select_players(&pool, pool.len(), |p| p % 3 == 0, &settings, &mut rng);
            assert!(selected.len() <= settings.per_team_max);
            if mode == AccessMode::VipOnly {
                assert!(selected.iter().all(|p| p % 3 == 0));
            }
        }
    }
}

#[test]
fn test_single_eligible_player_always_granted() {
    let players = [
        TestPlayer { id: 1, team: Team::TeamA, vip: false },
        TestPlayer { id: 2, team: Team::TeamA, vip: false },
        TestPlayer { id: 3, team: Team::TeamA, vip: false },
        TestPlayer { id: 4, team: Team::TeamB, vip: false },
    ];
    let mut config = AllocatorConfig::default();
    config.awp.enable = 1;
    config.awp.max_per_team = HashMap::from([(Team::TeamA, 1), (Team::TeamB, 1)]);
    config.ssg.enable = 0;

    let mut eligible = PreferenceRecord::new(PlayerId(2));
    eligible.set_preferred(Some(WeaponItem::AWP.into()));
    let mut allocator = build(config, Arc::new(MemoryStore::with_records([eligible])));
    let mut rng = StdRng::seed_from_u64(4);

    for _ in 0..100 {
        let (report, _) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
        assert_eq!(report.preferred_count(Team::TeamA), 1);
        assert!(report.result_for(PlayerId(2)).unwrap().preferred_granted);
        assert!(report.result_for(PlayerId(2)).unwrap().items.contains(&WeaponItem::AWP));
    }
}

#[test]
fn test_small_team_below_minimum_gets_nothing() {
    let players = lineup(4);
    let mut config = AllocatorConfig::default();
    config.awp.enable = 1;
    config.awp.min_players_per_team = HashMap::from([(Team::TeamA, 5), (Team::TeamB, 4)]);
    let mut allocator = build(config, awp_lovers(&players));
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..200 {
        let (report, _) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
        assert_eq!(report.preferred_count(Team::TeamA), 0);
        assert_eq!(report.preferred_count(Team::TeamB), 1);
    }
}

#[test]
fn test_scarce_items_only_in_full_buy() {
    let players = lineup(3);
    let mut config = AllocatorConfig::default();
    config.awp.enable = 1;
    let mut allocator = build(config, awp_lovers(&players));
    let mut rng = StdRng::seed_from_u64(6);

    for tier in [RoundTier::Pistol, RoundTier::HalfBuy] {
        let (report, _) = play(&mut allocator, &players, tier, &mut rng);
        assert_eq!(report.preferred_count(Team::TeamA), 0);
        assert_eq!(report.preferred_count(Team::TeamB), 0);
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[test]
fn test_default_only_is_deterministic() {
    let players = lineup(5);
    let mut config = AllocatorConfig::default();
    config.weapons.allowed_weapon_selection_types = vec![SelectionType::Default];
    config.awp.enable = 0;
    config.ssg.enable = 0;

    let store = awp_lovers(&players);
    let mut first = build(config.clone(), store.clone());
    let mut second = build(config, store);

    for tier in [RoundTier::HalfBuy, RoundTier::FullBuy] {
        let (_, grants_a) = play(&mut first, &players, tier, &mut StdRng::seed_from_u64(10));
        let (_, grants_b) = play(&mut second, &players, tier, &mut StdRng::seed_from_u64(99));
        assert_eq!(grants_a, grants_b);
    }

    let (report, _) = play(&mut first, &players, RoundTier::FullBuy, &mut StdRng::seed_from_u64(7));
    for result in report.team_results(Team::TeamA) {
        assert!(result.items.contains(&WeaponItem::AK47));
        assert!(result.items.contains(&WeaponItem::Deagle));
    }
    for result in report.team_results(Team::TeamB) {
        assert!(result.items.contains(&WeaponItem::M4A1S));
    }
}

#[test]
fn test_allocation_type_for_always_valid_for_tier() {
    let config = AllocatorConfig::default();
    let taxonomy = Taxonomy::new(&config.weapons);

    for tier in RoundTier::ALL {
        for team in Team::PLAYING {
            for item in WeaponItem::all_weapons() {
                if let Some(allocation_type) = taxonomy.allocation_type_for(tier, team, item) {
                    assert!(
                        is_valid_for_tier(allocation_type, tier),
                        "{} mapped to {} in a {} round",
                        item.name(),
                        allocation_type,
                        tier
                    );
                }
            }
        }
    }
}

#[test]
fn test_removed_choice_falls_through_to_default() {
    let mut record = PreferenceRecord::new(PlayerId(7));
    record.set_weapon_preference(Team::TeamA, AllocationType::FullBuyPrimary, Some(WeaponItem::Galil.into()));
    let mut rng = StdRng::seed_from_u64(8);

    let mut config = AllocatorConfig::default();
    config.weapons.allowed_weapon_selection_types = vec![SelectionType::PlayerChoice];
    let taxonomy = Taxonomy::new(&config.weapons);
    let resolution = PreferenceResolver::new(&config, &taxonomy).resolve(
        Some(&record),
        Team::TeamA,
        AllocationType::FullBuyPrimary,
        false,
        &mut rng,
    );
    assert_eq!(resolution.item, Some(WeaponItem::Galil));

    config.weapons.usable_weapons.remove(&WeaponItem::Galil);
    let taxonomy = Taxonomy::new(&config.weapons);
    let resolution = PreferenceResolver::new(&config, &taxonomy).resolve(
        Some(&record),
        Team::TeamA,
        AllocationType::FullBuyPrimary,
        false,
        &mut rng,
    );
    assert_eq!(resolution.item, None);

    config.weapons.allowed_weapon_selection_types = vec![SelectionType::PlayerChoice, SelectionType::Default];
    let taxonomy = Taxonomy::new(&config.weapons);
    let resolution = PreferenceResolver::new(&config, &taxonomy).resolve(
        Some(&record),
        Team::TeamA,
        AllocationType::FullBuyPrimary,
        false,
        &mut rng,
    );
    assert_eq!(resolution.item, Some(WeaponItem::AK47));
}

#[test]
fn test_random_sniper_preference_never_stored_as_item() {
    let players = [TestPlayer { id: 1, team: Team::TeamB, vip: true }];
    let mut record = PreferenceRecord::new(PlayerId(1));
    record.set_preferred(Some(WeaponPreference::RandomFromPool));
    let store = Arc::new(MemoryStore::with_records([record]));
    let cache = Arc::new(PreferenceCache::new(store.clone()));
    cache.hydrate(PlayerId(1)).unwrap();

    let mut allocator = RoundAllocator::new(Arc::new(AllocatorConfig::default()), cache.clone());
    let mut rng = StdRng::seed_from_u64(9);
    let (report, _) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
    assert!(report.result_for(PlayerId(1)).unwrap().preferred_granted);

    assert_eq!(
        cache
            .get(PlayerId(1))
            .unwrap()
            .weapon_preference(Team::TeamB, AllocationType::Preferred),
        Some(WeaponPreference::RandomFromPool)
    );
}

// ============================================================================
// DEGRADED STORAGE
// ============================================================================

#[test]
fn test_round_completes_while_store_unreachable() {
    let players = lineup(5);
    let store = awp_lovers(&players);
    store.set_fail_reads(true);
    let mut allocator = build(AllocatorConfig::default(), store);
    let mut rng = StdRng::seed_from_u64(11);

    let (report, grants) = play(&mut allocator, &players, RoundTier::FullBuy, &mut rng);
    assert_eq!(grants.len(), players.len());
    assert_eq!(report.results.len(), players.len());
    // Without readable preferences nobody qualifies for a scarce item
    assert_eq!(report.preferred_count(Team::TeamA), 0);
    assert!(grants.iter().all(|(_, items, _)| items.len() >= 3));
}

#[test]
fn test_equip_hint_per_team() {
    let players = lineup(2);
    let mut allocator = build(AllocatorConfig::default(), Arc::new(MemoryStore::new()));
    let mut rng = StdRng::seed_from_u64(12);

    let (_, grants) = play(&mut allocator, &players, RoundTier::HalfBuy, &mut rng);
    for (id, _, hint) in grants {
        let team = players.iter().find(|p| p.id == id).unwrap().team;
        match team {
            Team::TeamA => assert_eq!(hint.slot_name(), "slot5"),
            _ => assert_eq!(hint.slot_name(), "slot1"),
        }
    }
}
