//! Round allocation orchestrator.
//!
//! Drives one round from the start trigger to the last grant:
//! 1. Partition players by team
//! 2. Merge cached preferences with stored ones for uncached players
//! 3. Full-buy only: AWP-class pass, then SSG pass (chance gate, quota selection)
//! 4. Per player: armor and knife, secondary, primary (or the preferred
//!    override), cross-team swap accounting, defuse kit, special item
//! 5. Hand each player's items to the granter
//!
//! Allocation is total. Nothing in here returns an error; a slot that cannot
//! be resolved is simply left empty and a store outage only loses stored
//! preferences for players the cache does not know yet.

use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::resolver::PreferenceResolver;
use super::selector::{select_players, QuotaSettings};
use super::tiers::RoundTierPlanner;
use crate::cache::PreferenceCache;
use crate::config::{AccessMode, AllocatorConfig, ScarceCategoryConfig};
use crate::storage::PreferenceRecord;
use crate::taxonomy::{armor_for_tier, is_awp_class_preference, is_ssg_preference, knife_for_team, Taxonomy};
use crate::types::{AllocationType, ItemSlot, PlayerId, RoundTier, Team};
use crate::weapons::WeaponItem;

// ================================================================================================
// COLLABORATORS
// ================================================================================================

/// What the orchestrator needs to know about a player.
pub trait RoundPlayer {
    fn identity(&self) -> PlayerId;
    fn team(&self) -> Team;
}

/// Permission-gated features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PermissionCategory {
    Awp,
    Ssg,
    CrossTeam,
}

/// Permission lookup (VIP flags and the like).
pub trait PermissionOracle<P: ?Sized> {
    fn has_permission(&self, player: &P, category: PermissionCategory) -> bool;
}

impl<P: ?Sized, F> PermissionOracle<P> for F
where
    F: Fn(&P, PermissionCategory) -> bool,
{
    fn has_permission(&self, player: &P, category: PermissionCategory) -> bool {
        self(player, category)
    }
}

/// Side-effecting sink that puts items on a player, once per player per round.
pub trait ItemGranter<P: ?Sized> {
    fn grant(&mut self, player: &P, items: &[WeaponItem], equip_hint: ItemSlot);
}

impl<P: ?Sized, F> ItemGranter<P> for F
where
    F: FnMut(&P, &[WeaponItem], ItemSlot),
{
    fn grant(&mut self, player: &P, items: &[WeaponItem], equip_hint: ItemSlot) {
        self(player, items, equip_hint)
    }
}

// ================================================================================================
// RESULTS
// ================================================================================================

/// Everything one player received this round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundAllocationResult {
    pub player: PlayerId,
    pub team: Team,
    /// Items in grant order
    pub items: Vec<WeaponItem>,
    /// A scarce item replaced the tier primary
    pub preferred_granted: bool,
    /// A cross-team swap changed at least one slot
    pub cross_team_swapped: bool,
    pub defuse_kit: bool,
    pub special_item: bool,
    pub equip_hint: ItemSlot,
}

impl RoundAllocationResult {
    /// Scarce item granted this round, if any.
    pub fn preferred_item(&self, taxonomy: &Taxonomy) -> Option<WeaponItem> {
        if !self.preferred_granted {
            return None;
        }
        self.items
            .iter()
            .copied()
            .find(|item| taxonomy.is_preferred_class(self.team, *item))
    }
}

/// Outcome of one round.
#[derive(Clone, Debug)]
pub struct RoundReport {
    pub round_id: Uuid,
    pub tier: RoundTier,
    pub results: Vec<RoundAllocationResult>,
}

impl RoundReport {
    pub fn result_for(&self, player: PlayerId) -> Option<&RoundAllocationResult> {
        self.results.iter().find(|result| result.player == player)
    }

    pub fn team_results(&self, team: Team) -> impl Iterator<Item = &RoundAllocationResult> {
        self.results.iter().filter(move |result| result.team == team)
    }

    pub fn preferred_count(&self, team: Team) -> usize {
        self.team_results(team).filter(|result| result.preferred_granted).count()
    }

    /// Players of `team` holding `item`.
    pub fn item_count(&self, team: Team, item: WeaponItem) -> usize {
        self.team_results(team)
            .filter(|result| result.items.contains(&item))
            .count()
    }

    pub fn cross_team_count(&self, team: Team) -> usize {
        self.team_results(team).filter(|result| result.cross_team_swapped).count()
    }
}

// ================================================================================================
// ORCHESTRATOR
// ================================================================================================

/// Orchestrator state; a round runs from start to finish in one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocatorState {
    Idle,
    Allocating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScarceCategory {
    Awp,
    Ssg,
}

impl ScarceCategory {
    const ORDER: [ScarceCategory; 2] = [ScarceCategory::Awp, ScarceCategory::Ssg];

    fn config(self, config: &AllocatorConfig) -> &ScarceCategoryConfig {
        match self {
            ScarceCategory::Awp => &config.awp,
            ScarceCategory::Ssg => &config.ssg,
        }
    }

    fn permission(self) -> PermissionCategory {
        match self {
            ScarceCategory::Awp => PermissionCategory::Awp,
            ScarceCategory::Ssg => PermissionCategory::Ssg,
        }
    }

    fn accepts(self, item: WeaponItem) -> bool {
        self.accepts_preference(item.into())
    }

    fn accepts_preference(self, preference: crate::storage::WeaponPreference) -> bool {
        match self {
            ScarceCategory::Awp => is_awp_class_preference(preference),
            ScarceCategory::Ssg => is_ssg_preference(preference),
        }
    }
}

/// Per-round allocation entry point.
pub struct RoundAllocator {
    config: Arc<AllocatorConfig>,
    taxonomy: Arc<Taxonomy>,
    cache: Arc<PreferenceCache>,
    planner: RoundTierPlanner,
    state: AllocatorState,
    rounds_played: u64,
    /// Read uncached players from the store at round start
    store_merge: bool,
}

impl RoundAllocator {
    /// Builds an allocator for a validated configuration snapshot.
    pub fn new(config: Arc<AllocatorConfig>, cache: Arc<PreferenceCache>) -> Self {
        let taxonomy = Arc::new(Taxonomy::new(&config.weapons));
        let planner = RoundTierPlanner::new(config.round_types.clone());
        Self {
            config,
            taxonomy,
            cache,
            planner,
            state: AllocatorState::Idle,
            rounds_played: 0,
            store_merge: true,
        }
    }

    pub fn config(&self) -> &Arc<AllocatorConfig> {
        &self.config
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    pub fn state(&self) -> AllocatorState {
        self.state
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    /// Swaps in a new configuration snapshot between rounds.
    pub fn set_config(&mut self, config: Arc<AllocatorConfig>) {
        self.taxonomy = Arc::new(Taxonomy::new(&config.weapons));
        self.planner = RoundTierPlanner::new(config.round_types.clone());
        self.config = config;
    }

    /// Enables or disables the round-start store read for uncached players.
    ///
    /// That read runs synchronously on the thread calling [`allocate`](Self::allocate).
    /// A host that hydrates every player on connect and cannot block its game
    /// loop turns it off; uncached players then simply have no stored
    /// preferences for that round.
    pub fn set_store_merge(&mut self, enabled: bool) {
        self.store_merge = enabled;
    }

    /// Restarts the tier sequence (map change).
    pub fn reset_tiers(&mut self) {
        self.planner.reset();
    }

    /// Picks the next tier from the planner and allocates it.
    pub fn allocate_next_round<P, O, G, R>(
        &mut self,
        players: &[P],
        oracle: &O,
        granter: &mut G,
        rng: &mut R,
    ) -> RoundReport
    where
        P: RoundPlayer,
        O: PermissionOracle<P> + ?Sized,
        G: ItemGranter<P> + ?Sized,
        R: Rng + ?Sized,
    {
        let tier = self.planner.next_tier(rng);
        self.allocate(players, tier, oracle, granter, rng)
    }

    /// Allocates one round of `tier` to `players`.
    ///
    /// Players not on a playing team are skipped. Every other player gets
    /// exactly one `grant` call, in input order.
    ///
    /// Players missing from the cache are read from the store on the calling
    /// thread, once per round and only for those players. See
    /// [`set_store_merge`](Self::set_store_merge).
    pub fn allocate<P, O, G, R>(
        &mut self,
        players: &[P],
        tier: RoundTier,
        oracle: &O,
        granter: &mut G,
        rng: &mut R,
    ) -> RoundReport
    where
        P: RoundPlayer,
        O: PermissionOracle<P> + ?Sized,
        G: ItemGranter<P> + ?Sized,
        R: Rng + ?Sized,
    {
        self.state = AllocatorState::Allocating;
        let round_id = Uuid::new_v4();

        let mut team_a: Vec<usize> = Vec::new();
        let mut team_b: Vec<usize> = Vec::new();
        for (index, player) in players.iter().enumerate() {
            match player.team() {
                Team::TeamA => team_a.push(index),
                Team::TeamB => team_b.push(index),
                _ => {}
            }
        }
        debug!(
            "[Round {}] {} tier, {} vs {} players",
            round_id,
            tier,
            team_a.len(),
            team_b.len()
        );

        let ids: Vec<PlayerId> = team_a
            .iter()
            .chain(team_b.iter())
            .map(|index| players[*index].identity())
            .filter(|id| id.is_valid())
            .collect();
        let records = self.merge_records(&ids);

        let preferred = if tier == RoundTier::FullBuy {
            self.assign_preferred(players, &[&team_a, &team_b], &records, oracle, rng)
        } else {
            HashMap::new()
        };

        let defuser = if tier == RoundTier::Pistol {
            team_b.choose(rng).copied()
        } else {
            None
        };

        let resolver = PreferenceResolver::new(&self.config, &self.taxonomy);
        let cross_team = &self.config.enemy_stuff;
        let mut swaps: HashMap<Team, usize> = HashMap::new();
        let mut specials: HashMap<Team, usize> = HashMap::new();
        let mut results = Vec::with_capacity(team_a.len() + team_b.len());

        for (index, player) in players.iter().enumerate() {
            let team = player.team();
            if !team.is_playing() {
                continue;
            }

            let id = player.identity();
            let record = records.get(&id);
            let mut items = vec![armor_for_tier(tier), knife_for_team(team)];
            let mut cross_team_swapped = false;

            let swap_allowed = cross_team.access_mode() != AccessMode::Disabled
                && record.map_or(false, |record| record.is_cross_team_enabled_for(team))
                && (cross_team.access_mode() == AccessMode::Everyone
                    || oracle.has_permission(player, PermissionCategory::CrossTeam))
                && cross_team
                    .max_for_team(team)
                    .map_or(true, |max| swaps.get(&team).copied().unwrap_or(0) < max);

            let secondary_type = match tier {
                RoundTier::Pistol => AllocationType::PistolSlot,
                _ => AllocationType::SecondarySlot,
            };
            let secondary = resolver.resolve(record, team, secondary_type, swap_allowed, rng);
            cross_team_swapped |= secondary.cross_team_granted;
            items.extend(secondary.item);

            let preferred_item = preferred.get(&index).copied();
            match preferred_item {
                Some(item) => items.push(item),
                None => {
                    let primary_type = match tier {
                        RoundTier::Pistol => None,
                        RoundTier::HalfBuy => Some(AllocationType::HalfBuyPrimary),
                        RoundTier::FullBuy => Some(AllocationType::FullBuyPrimary),
                    };
                    if let Some(primary_type) = primary_type {
                        let primary = resolver.resolve(record, team, primary_type, swap_allowed, rng);
                        cross_team_swapped |= primary.cross_team_granted;
                        items.extend(primary.item);
                    }
                }
            }

            if cross_team_swapped {
                *swaps.entry(team).or_default() += 1;
            }

            let defuse_kit = team == Team::TeamB
                && (tier != RoundTier::Pistol || defuser == Some(index));
            if defuse_kit {
                items.push(WeaponItem::DefuseKit);
            }

            let special_item = self.roll_special_item(team, record, &mut specials, rng);
            if special_item {
                items.push(WeaponItem::Zeus);
            }

            let equip_hint = match team {
                Team::TeamA => ItemSlot::Objective,
                _ => ItemSlot::Primary,
            };

            granter.grant(player, &items, equip_hint);
            results.push(RoundAllocationResult {
                player: id,
                team,
                items,
                preferred_granted: preferred_item.is_some(),
                cross_team_swapped,
                defuse_kit,
                special_item,
                equip_hint,
            });
        }

        let report = RoundReport {
            round_id,
            tier,
            results,
        };

        info!(
            "[Round {}] Allocated {} tier: {} players, preferred {}/{}, cross-team {}/{}",
            report.round_id,
            tier,
            report.results.len(),
            report.preferred_count(Team::TeamA),
            report.preferred_count(Team::TeamB),
            report.cross_team_count(Team::TeamA),
            report.cross_team_count(Team::TeamB),
        );

        self.rounds_played += 1;
        self.state = AllocatorState::Idle;
        report
    }

    /// Cached records win; the store is asked only for uncached players.
    /// A failed store read leaves those players without stored preferences.
    ///
    /// The store call blocks the caller. With every player hydrated on
    /// connect it is skipped entirely.
    fn merge_records(&self, ids: &[PlayerId]) -> HashMap<PlayerId, PreferenceRecord> {
        let mut records = self.cache.get_cached(ids);

        let mut uncached: Vec<PlayerId> = ids
            .iter()
            .copied()
            .filter(|id| !records.contains_key(id))
            .collect();
        uncached.sort_unstable();
        uncached.dedup();

        if uncached.is_empty() {
            return records;
        }

        if !self.store_merge {
            debug!(
                "[Round] Store merge disabled, {} uncached players use no stored preferences",
                uncached.len()
            );
            return records;
        }

        match self.cache.store().get_many(&uncached) {
            Ok(stored) => {
                for (id, record) in stored {
                    records.entry(id).or_insert(record);
                }
            }
            Err(e) => {
                warn!(
                    "[Round] Store read for {} uncached players failed, using no stored preferences: {}",
                    uncached.len(),
                    e
                );
            }
        }

        records
    }

    /// Runs each scarce category pass and returns the chosen item per player index.
    fn assign_preferred<P, O, R>(
        &self,
        players: &[P],
        teams: &[&Vec<usize>],
        records: &HashMap<PlayerId, PreferenceRecord>,
        oracle: &O,
        rng: &mut R,
    ) -> HashMap<usize, WeaponItem>
    where
        P: RoundPlayer,
        O: PermissionOracle<P> + ?Sized,
        R: Rng + ?Sized,
    {
        let resolver = PreferenceResolver::new(&self.config, &self.taxonomy);
        let mut preferred: HashMap<usize, WeaponItem> = HashMap::new();

        for category in ScarceCategory::ORDER {
            let category_config = category.config(&self.config);
            if rng.gen::<f64>() * 100.0 >= category_config.chance {
                debug!("[Round] {:?} pass skipped by chance gate", category);
                continue;
            }

            for members in teams {
                let team = match members.first() {
                    Some(first) => players[*first].team(),
                    None => continue,
                };

                let pool: Vec<usize> = members
                    .iter()
                    .copied()
                    .filter(|index| !preferred.contains_key(index))
                    .filter(|index| {
                        records
                            .get(&players[*index].identity())
                            .and_then(|record| record.weapon_preference(team, AllocationType::Preferred))
                            .map_or(false, |preference| category.accepts_preference(preference))
                    })
                    .collect();

                let settings = QuotaSettings::for_category(category_config, team);
                let selected = select_players(
                    &pool,
                    members.len(),
                    |index| oracle.has_permission(&players[*index], category.permission()),
                    &settings,
                    rng,
                );

                for index in selected {
                    let record = match records.get(&players[index].identity()) {
                        Some(record) => record,
                        None => continue,
                    };
                    if let Some(item) =
                        resolver.resolve_preferred(record, team, |item| category.accepts(item), rng)
                    {
                        preferred.insert(index, item);
                    }
                }
            }
        }

        preferred
    }

    fn roll_special_item<R: Rng + ?Sized>(
        &self,
        team: Team,
        record: Option<&PreferenceRecord>,
        granted: &mut HashMap<Team, usize>,
        rng: &mut R,
    ) -> bool {
        let special = &self.config.zeus;
        if !special.is_enabled() || !record.map_or(false, |record| record.special_item_enabled) {
            return false;
        }

        let count = granted.entry(team).or_default();
        if *count >= special.max_for_team(team) {
            return false;
        }

        if rng.gen::<f64>() * 100.0 >= special.chance {
            return false;
        }

        *count += 1;
        true
    }
}
