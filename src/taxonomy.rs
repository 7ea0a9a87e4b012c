//! Weapon taxonomy: which items are reachable for each (team, allocation type),
//! which allocation types each round tier allows, and the inverse lookups.
//!
//! A `Taxonomy` is built once from a [`WeaponsConfig`] snapshot and is
//! immutable afterwards, so it can be shared freely between rounds and tests.

use crate::config::WeaponsConfig;
use crate::storage::types::WeaponPreference;
use crate::types::{AllocationType, ItemSlot, RoundTier, Team};
use crate::weapons::{ItemClass, WeaponItem};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};

use WeaponItem::*;

// ================================================================================================
// STATIC TABLES
// ================================================================================================

const SHARED_PISTOLS: &[WeaponItem] = &[Deagle, P250, CZ75, DualBerettas, R8Revolver];
const TEAM_A_PISTOLS: &[WeaponItem] = &[Glock, Tec9];
const TEAM_B_PISTOLS: &[WeaponItem] = &[USPS, P2000, FiveSeven];

const SHARED_MID: &[WeaponItem] = &[P90, UMP45, MP7, Bizon, MP5SD, XM1014, Nova];
const TEAM_A_MID: &[WeaponItem] = &[Mac10, SawedOff];
const TEAM_B_MID: &[WeaponItem] = &[MP9, MAG7];

const TEAM_A_RIFLES: &[WeaponItem] = &[AK47, Galil, SG553];
const TEAM_B_RIFLES: &[WeaponItem] = &[M4A1S, M4A4, Famas, AUG];
const HEAVIES: &[WeaponItem] = &[M249, Negev];

const SHARED_PREFERRED: &[WeaponItem] = &[AWP, SSG08];
const TEAM_A_PREFERRED: &[WeaponItem] = &[G3SG1];
const TEAM_B_PREFERRED: &[WeaponItem] = &[SCAR20];

/// Pool a random-sniper preference draws from each round.
pub const RANDOM_SNIPER_POOL: &[WeaponItem] = &[AWP, SSG08];

const AWP_CLASS: &[WeaponItem] = &[AWP, G3SG1, SCAR20];
const SSG_CLASS: &[WeaponItem] = &[SSG08];

static EMPTY: BTreeSet<WeaponItem> = BTreeSet::new();

fn team_items(team: Team, shared: &[WeaponItem], a: &[WeaponItem], b: &[WeaponItem]) -> BTreeSet<WeaponItem> {
    let own = match team {
        Team::TeamA => a,
        Team::TeamB => b,
        _ => return BTreeSet::new(),
    };
    shared.iter().chain(own.iter()).copied().collect()
}

fn base_items(team: Team, allocation_type: AllocationType) -> BTreeSet<WeaponItem> {
    match allocation_type {
        AllocationType::PistolSlot | AllocationType::SecondarySlot => {
            team_items(team, SHARED_PISTOLS, TEAM_A_PISTOLS, TEAM_B_PISTOLS)
        }
        AllocationType::HalfBuyPrimary => team_items(team, SHARED_MID, TEAM_A_MID, TEAM_B_MID),
        AllocationType::FullBuyPrimary => team_items(team, HEAVIES, TEAM_A_RIFLES, TEAM_B_RIFLES),
        AllocationType::Preferred => {
            team_items(team, SHARED_PREFERRED, TEAM_A_PREFERRED, TEAM_B_PREFERRED)
        }
    }
}

/// Full-buy extras unlocked by the shotgun/SMG toggles.
fn full_buy_extras(team: Team, config: &WeaponsConfig) -> BTreeSet<WeaponItem> {
    let mid = team_items(team, SHARED_MID, TEAM_A_MID, TEAM_B_MID);
    mid.into_iter()
        .filter(|item| {
            (config.enable_weapon_shotguns && item.is_shotgun())
                || (config.enable_weapon_smgs && item.is_smg())
        })
        .collect()
}

/// Allocation types each round tier can hand out.
pub fn valid_allocation_types(tier: RoundTier) -> &'static [AllocationType] {
    match tier {
        RoundTier::Pistol => &[AllocationType::PistolSlot],
        RoundTier::HalfBuy => &[AllocationType::SecondarySlot, AllocationType::HalfBuyPrimary],
        RoundTier::FullBuy => &[
            AllocationType::SecondarySlot,
            AllocationType::FullBuyPrimary,
            AllocationType::Preferred,
        ],
    }
}

pub fn is_valid_for_tier(allocation_type: AllocationType, tier: RoundTier) -> bool {
    valid_allocation_types(tier).contains(&allocation_type)
}

/// Tier-specific slot that a preferred item would otherwise occupy.
pub fn replacement_allocation_type(tier: RoundTier) -> AllocationType {
    match tier {
        RoundTier::Pistol => AllocationType::PistolSlot,
        RoundTier::HalfBuy => AllocationType::HalfBuyPrimary,
        RoundTier::FullBuy => AllocationType::FullBuyPrimary,
    }
}

pub fn slot_for(item: WeaponItem) -> Option<ItemSlot> {
    match item.class() {
        ItemClass::Pistol => Some(ItemSlot::Secondary),
        ItemClass::MidPrimary | ItemClass::FullPrimary | ItemClass::Preferred => {
            Some(ItemSlot::Primary)
        }
        ItemClass::Utility => Some(ItemSlot::Utility),
        ItemClass::None => None,
    }
}

/// Round tiers in which `item` can be handed out at all.
pub fn round_tiers_for(item: WeaponItem) -> Vec<RoundTier> {
    match item.class() {
        ItemClass::Pistol => RoundTier::ALL.to_vec(),
        ItemClass::MidPrimary => vec![RoundTier::HalfBuy],
        ItemClass::FullPrimary | ItemClass::Preferred => vec![RoundTier::FullBuy],
        _ => Vec::new(),
    }
}

pub fn armor_for_tier(tier: RoundTier) -> WeaponItem {
    match tier {
        RoundTier::Pistol => Kevlar,
        _ => KevlarHelmet,
    }
}

pub fn knife_for_team(team: Team) -> WeaponItem {
    match team {
        Team::TeamA => KnifeT,
        _ => KnifeCT,
    }
}

/// Preference that falls into the AWP/auto-sniper scarce category.
pub fn is_awp_class_preference(preference: WeaponPreference) -> bool {
    match preference {
        WeaponPreference::Fixed(item) => AWP_CLASS.contains(&item),
        WeaponPreference::RandomFromPool => true,
    }
}

/// Preference that falls into the SSG scarce category.
pub fn is_ssg_preference(preference: WeaponPreference) -> bool {
    match preference {
        WeaponPreference::Fixed(item) => SSG_CLASS.contains(&item),
        WeaponPreference::RandomFromPool => true,
    }
}

/// Uniform pick from the random-sniper pool.
pub fn choose_random_sniper<R: Rng + ?Sized>(rng: &mut R) -> WeaponItem {
    *RANDOM_SNIPER_POOL.choose(rng).unwrap_or(&AWP)
}

/// Maps a preferred-slot preference onto `team`.
///
/// Auto-snipers exist once per team, so either variant becomes the team's own.
/// Anything outside the preferred class yields `None`.
pub fn coerce_preferred_for_team(preference: WeaponPreference, team: Team) -> Option<WeaponPreference> {
    if !team.is_playing() {
        return None;
    }

    let item = match preference {
        WeaponPreference::RandomFromPool => return Some(WeaponPreference::RandomFromPool),
        WeaponPreference::Fixed(item) => item,
    };

    let coerced = match item {
        AWP | SSG08 => item,
        G3SG1 | SCAR20 => {
            if team == Team::TeamA {
                G3SG1
            } else {
                SCAR20
            }
        }
        _ => return None,
    };

    Some(WeaponPreference::Fixed(coerced))
}

// ================================================================================================
// TAXONOMY
// ================================================================================================

/// Classification tables resolved against one configuration snapshot.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    /// Reachable items per (team, allocation type), before the usable filter
    available: HashMap<(Team, AllocationType), BTreeSet<WeaponItem>>,
    /// `available` intersected with the usable allow-list
    usable: HashMap<(Team, AllocationType), BTreeSet<WeaponItem>>,
    /// Usable allow-list
    usable_weapons: BTreeSet<WeaponItem>,
    /// Configured defaults
    defaults: HashMap<Team, HashMap<AllocationType, WeaponItem>>,
}

impl Taxonomy {
    /// Builds the tables for a configuration snapshot.
    pub fn new(config: &WeaponsConfig) -> Self {
        let usable_weapons: BTreeSet<WeaponItem> = config.usable_weapons.iter().copied().collect();
        let mut available = HashMap::new();

        for team in Team::PLAYING {
            for allocation_type in AllocationType::ALL {
                let mut items = base_items(team, allocation_type);
                if allocation_type == AllocationType::FullBuyPrimary {
                    items.extend(full_buy_extras(team, config));
                }

                // Preferred never widens across teams
                if config.enable_all_weapons_for_everyone
                    && allocation_type != AllocationType::Preferred
                {
                    if let Some(other) = team.opponent() {
                        items.extend(base_items(other, allocation_type));
                        if allocation_type == AllocationType::FullBuyPrimary {
                            items.extend(full_buy_extras(other, config));
                        }
                    }
                }

                available.insert((team, allocation_type), items);
            }
        }

        let usable = available
            .iter()
            .map(|(key, items)| {
                let filtered = items
                    .iter()
                    .filter(|item| usable_weapons.contains(*item))
                    .copied()
                    .collect();
                (*key, filtered)
            })
            .collect();

        Self {
            available,
            usable,
            usable_weapons,
            defaults: config.default_weapons.clone(),
        }
    }

    /// Items reachable for a slot and team, including configured widening.
    pub fn available_items(&self, allocation_type: AllocationType, team: Team) -> &BTreeSet<WeaponItem> {
        self.available.get(&(team, allocation_type)).unwrap_or(&EMPTY)
    }

    /// `available_items` restricted to the usable allow-list.
    pub fn usable_items(&self, allocation_type: AllocationType, team: Team) -> &BTreeSet<WeaponItem> {
        self.usable.get(&(team, allocation_type)).unwrap_or(&EMPTY)
    }

    #[inline]
    pub fn is_usable(&self, item: WeaponItem) -> bool {
        self.usable_weapons.contains(&item)
    }

    /// Whether `item` belongs to the team's scarce preferred set.
    pub fn is_preferred_class(&self, team: Team, item: WeaponItem) -> bool {
        self.available_items(AllocationType::Preferred, team).contains(&item)
    }

    /// Every allocation type from which `team` can reach `item`.
    pub fn allocation_types_for(&self, team: Team, item: WeaponItem) -> Vec<AllocationType> {
        AllocationType::ALL
            .into_iter()
            .filter(|allocation_type| self.available_items(*allocation_type, team).contains(&item))
            .collect()
    }

    /// Inverse lookup: the allocation type `item` fills for `team` in a `tier` round.
    ///
    /// Pistols are reachable from both the pistol and the secondary slot; the
    /// tier decides which one applies. Returns `None` when the item is not
    /// reachable for this team in this tier.
    pub fn allocation_type_for(&self, tier: RoundTier, team: Team, item: WeaponItem) -> Option<AllocationType> {
        self.allocation_types_for(team, item)
            .into_iter()
            .find(|allocation_type| is_valid_for_tier(*allocation_type, tier))
    }

    /// Configured default for a slot, if one exists and is usable.
    pub fn default_item(&self, allocation_type: AllocationType, team: Team) -> Option<WeaponItem> {
        if !team.is_playing() || allocation_type == AllocationType::Preferred {
            return None;
        }

        let configured = self
            .defaults
            .get(&team)
            .and_then(|defaults| defaults.get(&allocation_type))
            .copied();

        let item = match configured {
            Some(item) => item,
            None => crate::config::default_weapon_table()
                .get(&team)
                .and_then(|defaults| defaults.get(&allocation_type))
                .copied()?,
        };

        if self.is_usable(item) {
            Some(item)
        } else {
            None
        }
    }

    /// Uniform pick from the usable items for a slot.
    pub fn random_item<R: Rng + ?Sized>(
        &self,
        allocation_type: AllocationType,
        team: Team,
        rng: &mut R,
    ) -> Option<WeaponItem> {
        let items: Vec<WeaponItem> = self.usable_items(allocation_type, team).iter().copied().collect();
        items.choose(rng).copied()
    }
}
