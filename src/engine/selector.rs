//! Quota-constrained selection for scarce categories.
//!
//! Given the players of one team who asked for a scarce item, picks who
//! actually gets it this round. The same routine serves every scarce
//! category; each call has its own settings.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::hash::Hash;

use crate::config::{AccessMode, ScarceCategoryConfig};
use crate::types::Team;

/// Selection settings for one category and one team.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaSettings {
    pub mode: AccessMode,
    pub per_team_max: usize,
    /// Teams smaller than this never receive the item
    pub min_team_population: usize,
}

impl QuotaSettings {
    pub fn for_category(config: &ScarceCategoryConfig, team: Team) -> Self {
        Self {
            mode: config.access_mode(),
            per_team_max: config.max_for_team(team),
            min_team_population: config.min_players_for_team(team),
        }
    }
}

/// Selects at most `per_team_max` distinct players from `pool`.
///
/// - `Disabled` selects nobody
/// - `Everyone` draws from the whole pool
/// - `VipOnly` draws only from players passing `has_permission`
///
/// Nobody is selected when `team_population` is below the minimum or the
/// quota is zero. Otherwise the candidates are deduplicated, shuffled
/// uniformly and truncated to the quota.
pub fn select_players<T, F, R>(
    pool: &[T],
    team_population: usize,
    has_permission: F,
    settings: &QuotaSettings,
    rng: &mut R,
) -> Vec<T>
where
    T: Copy + Eq + Hash,
    F: Fn(&T) -> bool,
    R: Rng + ?Sized,
{
    if settings.mode == AccessMode::Disabled {
        return Vec::new();
    }

    if team_population < settings.min_team_population || settings.per_team_max == 0 {
        return Vec::new();
    }

    let mut seen = HashSet::with_capacity(pool.len());
    let mut candidates: Vec<T> = pool
        .iter()
        .copied()
        .filter(|player| seen.insert(*player))
        .filter(|player| settings.mode == AccessMode::Everyone || has_permission(player))
        .collect();

    candidates.shuffle(rng);
    candidates.truncate(settings.per_team_max);
    candidates
}
