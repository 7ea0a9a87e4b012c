//! Core identifiers shared by the cache, taxonomy and allocation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ================================================================================================
// PLAYER IDENTITY
// ================================================================================================

/// Stable 64-bit player identity that persists across sessions.
///
/// The value `0` means "unknown" and is never cached or persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl PlayerId {
    pub const INVALID: PlayerId = PlayerId(0);

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PlayerId {
    fn from(value: u64) -> Self {
        PlayerId(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ================================================================================================
// TEAMS
// ================================================================================================

/// Team membership. Only `TeamA` (attackers) and `TeamB` (defenders) take part in allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    None,
    Spectator,
    #[serde(alias = "T", alias = "Terrorist")]
    TeamA,
    #[serde(alias = "CT", alias = "CounterTerrorist")]
    TeamB,
}

impl Team {
    /// The two teams that receive items.
    pub const PLAYING: [Team; 2] = [Team::TeamA, Team::TeamB];

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Team::TeamA | Team::TeamB)
    }

    /// Opposing playing team, or `None` for non-playing teams.
    pub fn opponent(&self) -> Option<Team> {
        match self {
            Team::TeamA => Some(Team::TeamB),
            Team::TeamB => Some(Team::TeamA),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Team::None => "none",
            Team::Spectator => "spec",
            Team::TeamA => "T",
            Team::TeamB => "CT",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

// ================================================================================================
// ROUND TIERS & ALLOCATION TYPES
// ================================================================================================

/// Buy-power classification of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoundTier {
    Pistol,
    HalfBuy,
    FullBuy,
}

impl RoundTier {
    pub const ALL: [RoundTier; 3] = [RoundTier::Pistol, RoundTier::HalfBuy, RoundTier::FullBuy];
}

impl fmt::Display for RoundTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundTier::Pistol => "Pistol",
            RoundTier::HalfBuy => "HalfBuy",
            RoundTier::FullBuy => "FullBuy",
        };
        f.write_str(name)
    }
}

/// A weapon slot resolved once per player per round.
///
/// `Preferred` is the scarce category: quota gated, and when granted it
/// replaces the tier-specific primary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AllocationType {
    #[serde(alias = "PistolRound")]
    PistolSlot,
    HalfBuyPrimary,
    FullBuyPrimary,
    #[serde(alias = "Secondary")]
    SecondarySlot,
    Preferred,
}

impl AllocationType {
    pub const ALL: [AllocationType; 5] = [
        AllocationType::PistolSlot,
        AllocationType::HalfBuyPrimary,
        AllocationType::FullBuyPrimary,
        AllocationType::SecondarySlot,
        AllocationType::Preferred,
    ];

    /// Allocation types that carry a per-team default weapon.
    pub const WITH_DEFAULTS: [AllocationType; 4] = [
        AllocationType::PistolSlot,
        AllocationType::HalfBuyPrimary,
        AllocationType::FullBuyPrimary,
        AllocationType::SecondarySlot,
    ];
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AllocationType::PistolSlot => "PistolSlot",
            AllocationType::HalfBuyPrimary => "HalfBuyPrimary",
            AllocationType::FullBuyPrimary => "FullBuyPrimary",
            AllocationType::SecondarySlot => "SecondarySlot",
            AllocationType::Preferred => "Preferred",
        };
        f.write_str(name)
    }
}

/// Equipment slot an item occupies once granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemSlot {
    Primary,
    Secondary,
    Utility,
    /// Objective carrier slot (bomb)
    Objective,
}

impl ItemSlot {
    /// Slot name understood by the item-granting collaborator.
    pub fn slot_name(&self) -> &'static str {
        match self {
            ItemSlot::Primary => "slot1",
            ItemSlot::Secondary => "slot2",
            ItemSlot::Utility => "slot4",
            ItemSlot::Objective => "slot5",
        }
    }
}
