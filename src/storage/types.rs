//! Preference record types shared by the cache and the stores.

use crate::taxonomy::coerce_preferred_for_team;
use crate::types::{now_ms, AllocationType, PlayerId, Team};
use crate::weapons::WeaponItem;
use serde::{Deserialize, Serialize};

/// A stored weapon choice.
///
/// `RandomFromPool` is re-rolled from the sniper pool every round rather than
/// being pinned to a concrete item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponPreference {
    Fixed(WeaponItem),
    RandomFromPool,
}

impl From<WeaponItem> for WeaponPreference {
    fn from(item: WeaponItem) -> Self {
        WeaponPreference::Fixed(item)
    }
}

/// Teams on which a player wants the opposing team's weapons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossTeamPreference {
    #[default]
    None,
    TeamA,
    TeamB,
    Both,
}

impl CrossTeamPreference {
    pub fn is_enabled_for(&self, team: Team) -> bool {
        match self {
            CrossTeamPreference::None => false,
            CrossTeamPreference::TeamA => team == Team::TeamA,
            CrossTeamPreference::TeamB => team == Team::TeamB,
            CrossTeamPreference::Both => team.is_playing(),
        }
    }
}

/// One team's worth of slot preferences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPreferences {
    pub pistol: Option<WeaponPreference>,
    pub secondary: Option<WeaponPreference>,
    pub half_buy_primary: Option<WeaponPreference>,
    pub full_buy_primary: Option<WeaponPreference>,
    pub preferred: Option<WeaponPreference>,
}

impl TeamPreferences {
    fn slot(&self, allocation_type: AllocationType) -> Option<WeaponPreference> {
        match allocation_type {
            AllocationType::PistolSlot => self.pistol,
            AllocationType::SecondarySlot => self.secondary,
            AllocationType::HalfBuyPrimary => self.half_buy_primary,
            AllocationType::FullBuyPrimary => self.full_buy_primary,
            AllocationType::Preferred => self.preferred,
        }
    }

    fn slot_mut(&mut self, allocation_type: AllocationType) -> &mut Option<WeaponPreference> {
        match allocation_type {
            AllocationType::PistolSlot => &mut self.pistol,
            AllocationType::SecondarySlot => &mut self.secondary,
            AllocationType::HalfBuyPrimary => &mut self.half_buy_primary,
            AllocationType::FullBuyPrimary => &mut self.full_buy_primary,
            AllocationType::Preferred => &mut self.preferred,
        }
    }
}

/// Everything stored for one player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub user_id: PlayerId,
    pub team_a: TeamPreferences,
    pub team_b: TeamPreferences,
    /// Player opted into the special item (Zeus)
    #[serde(default)]
    pub special_item_enabled: bool,
    #[serde(default)]
    pub cross_team: CrossTeamPreference,
}

impl PreferenceRecord {
    /// Blank record for a player with no stored preferences.
    pub fn new(user_id: PlayerId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    fn team(&self, team: Team) -> Option<&TeamPreferences> {
        match team {
            Team::TeamA => Some(&self.team_a),
            Team::TeamB => Some(&self.team_b),
            _ => None,
        }
    }

    fn team_mut(&mut self, team: Team) -> Option<&mut TeamPreferences> {
        match team {
            Team::TeamA => Some(&mut self.team_a),
            Team::TeamB => Some(&mut self.team_b),
            _ => None,
        }
    }

    pub fn weapon_preference(&self, team: Team, allocation_type: AllocationType) -> Option<WeaponPreference> {
        self.team(team).and_then(|prefs| prefs.slot(allocation_type))
    }

    /// Sets one slot. Non-playing teams are ignored.
    ///
    /// The `Preferred` slot only ever holds a preferred-class item (coerced to
    /// the team's variant) or the random-sniper marker; anything else clears it.
    pub fn set_weapon_preference(
        &mut self,
        team: Team,
        allocation_type: AllocationType,
        preference: Option<WeaponPreference>,
    ) {
        let preference = match (allocation_type, preference) {
            (AllocationType::Preferred, Some(pref)) => coerce_preferred_for_team(pref, team),
            (_, pref) => pref,
        };

        if let Some(prefs) = self.team_mut(team) {
            *prefs.slot_mut(allocation_type) = preference;
        }
    }

    /// Sets the preferred slot on both teams at once.
    pub fn set_preferred(&mut self, preference: Option<WeaponPreference>) {
        for team in Team::PLAYING {
            self.set_weapon_preference(team, AllocationType::Preferred, preference);
        }
    }

    pub fn clear_weapon_preferences(&mut self) {
        self.team_a = TeamPreferences::default();
        self.team_b = TeamPreferences::default();
    }

    pub fn is_cross_team_enabled_for(&self, team: Team) -> bool {
        self.cross_team.is_enabled_for(team)
    }
}

/// A cached record plus its persistence state.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub record: PreferenceRecord,

    /// Holds a mutation not yet written to the store
    pub dirty: bool,

    /// When this entry was created or hydrated (Unix timestamp ms)
    pub loaded_at: u64,

    /// Last mutation (Unix timestamp ms)
    pub updated_at: u64,

    /// Bumped by every mutation; a write may only retire the version it wrote
    pub version: u64,
}

impl CacheEntry {
    /// Entry for a record that already matches the store.
    pub fn clean(record: PreferenceRecord) -> Self {
        let now = now_ms();
        Self {
            record,
            dirty: false,
            loaded_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.updated_at = now_ms();
        self.version += 1;
    }
}

/// Cache occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of players held in memory
    pub cached_players: usize,
    /// Number of players with unflushed changes
    pub dirty_players: usize,
}

/// Outcome of one bulk flush attempt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Records written successfully
    pub flushed: usize,
    /// Records whose write failed and were re-marked dirty
    pub failed: usize,
    /// Another flush was already running; nothing was done
    pub skipped: bool,
    /// Duration of the flush in milliseconds
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_per_team() {
        let mut record = PreferenceRecord::new(PlayerId(7));
        record.set_weapon_preference(
            Team::TeamA,
            AllocationType::FullBuyPrimary,
            Some(WeaponItem::Galil.into()),
        );
        assert_eq!(
            record.weapon_preference(Team::TeamA, AllocationType::FullBuyPrimary),
            Some(WeaponPreference::Fixed(WeaponItem::Galil))
        );
        assert_eq!(record.weapon_preference(Team::TeamB, AllocationType::FullBuyPrimary), None);
        assert_eq!(record.weapon_preference(Team::Spectator, AllocationType::FullBuyPrimary), None);
    }

    #[test]
    fn test_preferred_slot_is_coerced() {
        let mut record = PreferenceRecord::new(PlayerId(7));
        record.set_preferred(Some(WeaponItem::SCAR20.into()));
        assert_eq!(
            record.weapon_preference(Team::TeamA, AllocationType::Preferred),
            Some(WeaponPreference::Fixed(WeaponItem::G3SG1))
        );
        assert_eq!(
            record.weapon_preference(Team::TeamB, AllocationType::Preferred),
            Some(WeaponPreference::Fixed(WeaponItem::SCAR20))
        );

        record.set_weapon_preference(Team::TeamA, AllocationType::Preferred, Some(WeaponItem::AK47.into()));
        assert_eq!(record.weapon_preference(Team::TeamA, AllocationType::Preferred), None);
    }

    #[test]
    fn test_cross_team_preference() {
        assert!(CrossTeamPreference::Both.is_enabled_for(Team::TeamA));
        assert!(CrossTeamPreference::TeamB.is_enabled_for(Team::TeamB));
        assert!(!CrossTeamPreference::TeamB.is_enabled_for(Team::TeamA));
        assert!(!CrossTeamPreference::Both.is_enabled_for(Team::Spectator));
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = PreferenceRecord::new(PlayerId(42));
        record.set_preferred(Some(WeaponPreference::RandomFromPool));
        record.special_item_enabled = true;
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PreferenceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
        assert!(json.contains("RandomFromPool"));
    }
}
