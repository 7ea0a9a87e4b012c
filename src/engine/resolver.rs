//! Preference resolution: one (player, allocation type, team) to one item.
//!
//! Fallback chain, each step only if enabled in configuration:
//! 1. Player choice (usable explicit preference, or a fresh random sniper)
//! 2. Uniform random pick from the usable items for the slot
//! 3. Configured default for the slot, if usable
//!
//! A resolved non-preferred item may then be swapped for the opposing team's
//! equivalent (cross-team swap). The opposing lookup never swaps again.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{AccessMode, AllocatorConfig};
use crate::storage::{PreferenceRecord, WeaponPreference};
use crate::taxonomy::{choose_random_sniper, Taxonomy, RANDOM_SNIPER_POOL};
use crate::types::{AllocationType, Team};
use crate::weapons::WeaponItem;

/// Outcome of resolving one slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// `None` is a valid outcome: nothing is granted for the slot
    pub item: Option<WeaponItem>,
    /// A cross-team swap replaced the item with a different one
    pub cross_team_granted: bool,
}

/// Resolves slots against one configuration snapshot.
#[derive(Clone, Copy)]
pub struct PreferenceResolver<'a> {
    config: &'a AllocatorConfig,
    taxonomy: &'a Taxonomy,
}

impl<'a> PreferenceResolver<'a> {
    pub fn new(config: &'a AllocatorConfig, taxonomy: &'a Taxonomy) -> Self {
        Self { config, taxonomy }
    }

    /// Resolves `allocation_type` for a player on `team`.
    ///
    /// # Arguments
    /// - `record`: the player's preferences, `None` if unknown
    /// - `swap_allowed`: the caller's verdict on swap permission and quota;
    ///   the probability gate and the player's own toggle are checked here
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        record: Option<&PreferenceRecord>,
        team: Team,
        allocation_type: AllocationType,
        swap_allowed: bool,
        rng: &mut R,
    ) -> Resolution {
        let item = match self.resolve_chain(record, team, allocation_type, rng) {
            Some(item) => item,
            None => return Resolution::default(),
        };

        if swap_allowed {
            self.maybe_swap(record, team, allocation_type, item, rng)
        } else {
            Resolution {
                item: Some(item),
                cross_team_granted: false,
            }
        }
    }

    /// The player's preferred-slot item, for players already selected by quota.
    ///
    /// Only items passing `accept` (the scarce category being handed out) are
    /// granted. A random-sniper preference is re-rolled on every call from the
    /// usable, accepted part of the pool.
    pub fn resolve_preferred<F, R>(
        &self,
        record: &PreferenceRecord,
        team: Team,
        accept: F,
        rng: &mut R,
    ) -> Option<WeaponItem>
    where
        F: Fn(WeaponItem) -> bool,
        R: Rng + ?Sized,
    {
        match record.weapon_preference(team, AllocationType::Preferred)? {
            WeaponPreference::RandomFromPool => {
                let pool: Vec<WeaponItem> = RANDOM_SNIPER_POOL
                    .iter()
                    .copied()
                    .filter(|item| self.taxonomy.is_usable(*item) && accept(*item))
                    .collect();
                pool.choose(rng).copied()
            }
            WeaponPreference::Fixed(item) if self.taxonomy.is_usable(item) && accept(item) => Some(item),
            WeaponPreference::Fixed(_) => None,
        }
    }

    fn resolve_chain<R: Rng + ?Sized>(
        &self,
        record: Option<&PreferenceRecord>,
        team: Team,
        allocation_type: AllocationType,
        rng: &mut R,
    ) -> Option<WeaponItem> {
        if !team.is_playing() {
            return None;
        }

        if self.config.can_players_select_weapons() {
            let choice = record
                .and_then(|record| record.weapon_preference(team, allocation_type))
                .and_then(|preference| match preference {
                    WeaponPreference::RandomFromPool => Some(choose_random_sniper(rng)),
                    WeaponPreference::Fixed(item) if self.taxonomy.is_usable(item) => Some(item),
                    WeaponPreference::Fixed(_) => None,
                });
            if choice.is_some() {
                return choice;
            }
        }

        if self.config.can_assign_random_weapons() {
            if let Some(item) = self.taxonomy.random_item(allocation_type, team, rng) {
                return Some(item);
            }
        }

        if self.config.can_assign_default_weapons() {
            return self.taxonomy.default_item(allocation_type, team);
        }

        None
    }

    fn maybe_swap<R: Rng + ?Sized>(
        &self,
        record: Option<&PreferenceRecord>,
        team: Team,
        allocation_type: AllocationType,
        item: WeaponItem,
        rng: &mut R,
    ) -> Resolution {
        let unchanged = Resolution {
            item: Some(item),
            cross_team_granted: false,
        };

        let cross_team = &self.config.enemy_stuff;
        if allocation_type == AllocationType::Preferred
            || cross_team.access_mode() == AccessMode::Disabled
            || cross_team.chance <= 0.0
        {
            return unchanged;
        }

        let record = match record {
            Some(record) if record.is_cross_team_enabled_for(team) => record,
            _ => return unchanged,
        };

        let enemy = match team.opponent() {
            Some(enemy) => enemy,
            None => return unchanged,
        };

        if rng.gen::<f64>() * 100.0 >= cross_team.chance {
            return unchanged;
        }

        let swapped = self
            .resolve_chain(Some(record), enemy, allocation_type, rng)
            .or_else(|| self.taxonomy.random_item(allocation_type, enemy, rng));

        match swapped {
            Some(swapped) => Resolution {
                item: Some(swapped),
                cross_team_granted: swapped != item,
            },
            None => unchanged,
        }
    }
}
