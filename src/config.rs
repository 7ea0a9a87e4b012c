//! Allocator configuration.
//!
//! Loaded once from a categorized JSON file and validated up front; a round
//! only ever sees an immutable, already-validated snapshot.
//!
//! ```json
//! {
//!   "Weapons":    { "UsableWeapons": [...], "AllowedWeaponSelectionTypes": [...], "DefaultWeapons": {...} },
//!   "RoundTypes": { "RoundTypeSelection": "Random", "RoundTypePercentages": {...} },
//!   "AWP":        { "EnableAwp": 2, "ChanceForAwpWeapon": 100, "MaxAwpWeaponsPerTeam": {...} },
//!   "SSG":        { ... },
//!   "EnemyStuff": { "EnableEnemyStuff": 2, "ChanceForEnemyStuff": 0, "MaxEnemyStuffPerTeam": {...} },
//!   "Zeus":       { "EnableZeus": 0, "ChanceForZeusWeapon": 100, "MaxZeusPerTeam": {...} },
//!   "Cache":      { "FlushIntervalSecs": 120 },
//!   "Database":   { "Path": "./var/data/preferences.db" }
//! }
//! ```
//!
//! Every section and every field is optional.

use crate::types::{AllocationType, RoundTier, Team};
use crate::weapons::WeaponItem;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ================================================================================================
// ENUMS
// ================================================================================================

/// Fallback steps the resolver may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionType {
    PlayerChoice,
    Random,
    Default,
}

/// Who may receive a scarce or cross-team item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Disabled,
    Everyone,
    VipOnly,
}

impl AccessMode {
    /// Maps the raw configuration value; anything outside 0..=2 is rejected at load.
    pub fn from_raw(value: i32) -> AccessMode {
        match value {
            i32::MIN..=0 => AccessMode::Disabled,
            1 => AccessMode::Everyone,
            _ => AccessMode::VipOnly,
        }
    }
}

/// How the next round tier is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierSelectionMode {
    Random,
    RandomFixedCounts,
    ManualOrdering,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualOrderingItem {
    #[serde(rename = "Type")]
    pub tier: RoundTier,
    pub count: u32,
}

// ================================================================================================
// SECTIONS
// ================================================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct WeaponsConfig {
    /// Allow-list of items that may ever be granted
    pub usable_weapons: HashSet<WeaponItem>,
    /// Enabled fallback steps
    pub allowed_weapon_selection_types: Vec<SelectionType>,
    /// Per-team, per-allocation-type default weapon
    pub default_weapons: HashMap<Team, HashMap<AllocationType, WeaponItem>>,
    /// Widen every non-preferred slot with the opposing team's items
    pub enable_all_weapons_for_everyone: bool,
    /// Add shotguns to the full-buy primary pool
    pub enable_weapon_shotguns: bool,
    /// Add SMGs to the full-buy primary pool
    #[serde(alias = "EnableWeaponPms")]
    pub enable_weapon_smgs: bool,
}

impl Default for WeaponsConfig {
    fn default() -> Self {
        Self {
            usable_weapons: WeaponItem::all_weapons().collect(),
            allowed_weapon_selection_types: vec![
                SelectionType::PlayerChoice,
                SelectionType::Random,
                SelectionType::Default,
            ],
            default_weapons: default_weapon_table(),
            enable_all_weapons_for_everyone: false,
            enable_weapon_shotguns: false,
            enable_weapon_smgs: false,
        }
    }
}

/// Built-in per-team defaults.
pub fn default_weapon_table() -> HashMap<Team, HashMap<AllocationType, WeaponItem>> {
    let team_a = HashMap::from([
        (AllocationType::FullBuyPrimary, WeaponItem::AK47),
        (AllocationType::HalfBuyPrimary, WeaponItem::Mac10),
        (AllocationType::SecondarySlot, WeaponItem::Deagle),
        (AllocationType::PistolSlot, WeaponItem::Glock),
    ]);
    let team_b = HashMap::from([
        (AllocationType::FullBuyPrimary, WeaponItem::M4A1S),
        (AllocationType::HalfBuyPrimary, WeaponItem::MP9),
        (AllocationType::SecondarySlot, WeaponItem::Deagle),
        (AllocationType::PistolSlot, WeaponItem::USPS),
    ]);
    HashMap::from([(Team::TeamA, team_a), (Team::TeamB, team_b)])
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RoundTypesConfig {
    #[serde(rename = "RoundTypeSelection")]
    pub selection: TierSelectionMode,
    #[serde(rename = "RoundTypePercentages")]
    pub percentages: HashMap<RoundTier, u32>,
    #[serde(rename = "RoundTypeRandomFixedCounts")]
    pub random_fixed_counts: HashMap<RoundTier, u32>,
    #[serde(rename = "RoundTypeManualOrdering")]
    pub manual_ordering: Vec<ManualOrderingItem>,
}

impl Default for RoundTypesConfig {
    fn default() -> Self {
        Self {
            selection: TierSelectionMode::Random,
            percentages: HashMap::from([
                (RoundTier::Pistol, 15),
                (RoundTier::HalfBuy, 25),
                (RoundTier::FullBuy, 60),
            ]),
            random_fixed_counts: HashMap::from([
                (RoundTier::Pistol, 5),
                (RoundTier::HalfBuy, 10),
                (RoundTier::FullBuy, 15),
            ]),
            manual_ordering: vec![
                ManualOrderingItem { tier: RoundTier::Pistol, count: 5 },
                ManualOrderingItem { tier: RoundTier::HalfBuy, count: 10 },
                ManualOrderingItem { tier: RoundTier::FullBuy, count: 15 },
            ],
        }
    }
}

/// Settings for one scarce ("preferred") category.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ScarceCategoryConfig {
    /// 0 = disabled, 1 = everyone, 2 = VIP only
    #[serde(alias = "EnableAwp", alias = "EnableSsg")]
    pub enable: i32,
    #[serde(alias = "AwpPermission", alias = "SsgPermission")]
    pub permission: String,
    /// Per-round probability gate, 0..=100
    #[serde(alias = "ChanceForAwpWeapon", alias = "ChanceForSsgWeapon")]
    pub chance: f64,
    #[serde(alias = "MaxAwpWeaponsPerTeam", alias = "MaxSsgWeaponsPerTeam")]
    pub max_per_team: HashMap<Team, u32>,
    #[serde(alias = "MinPlayersPerTeamForAwpWeapon", alias = "MinPlayersPerTeamForSsgWeapon")]
    pub min_players_per_team: HashMap<Team, u32>,
}

impl Default for ScarceCategoryConfig {
    fn default() -> Self {
        Self {
            enable: 2,
            permission: "@css/vip".to_string(),
            chance: 100.0,
            max_per_team: per_team(1),
            min_players_per_team: per_team(1),
        }
    }
}

impl ScarceCategoryConfig {
    pub fn access_mode(&self) -> AccessMode {
        AccessMode::from_raw(self.enable)
    }

    /// Per-team cap; a team missing from the table gets one.
    pub fn max_for_team(&self, team: Team) -> usize {
        self.max_per_team.get(&team).copied().unwrap_or(1) as usize
    }

    pub fn min_players_for_team(&self, team: Team) -> usize {
        self.min_players_per_team.get(&team).copied().unwrap_or(0) as usize
    }
}

/// Cross-team ("enemy stuff") swap settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CrossTeamConfig {
    #[serde(rename = "EnableEnemyStuff")]
    pub enable: i32,
    #[serde(rename = "EnemyStuffPermission")]
    pub permission: String,
    #[serde(rename = "ChanceForEnemyStuff")]
    pub chance: f64,
    /// -1 means unlimited
    #[serde(rename = "MaxEnemyStuffPerTeam")]
    pub max_per_team: HashMap<Team, i32>,
}

impl Default for CrossTeamConfig {
    fn default() -> Self {
        Self {
            enable: 2,
            permission: "@css/vip".to_string(),
            chance: 0.0,
            max_per_team: HashMap::from([(Team::TeamA, -1), (Team::TeamB, -1)]),
        }
    }
}

impl CrossTeamConfig {
    pub fn access_mode(&self) -> AccessMode {
        AccessMode::from_raw(self.enable)
    }

    /// `None` when the team's swap quota is unlimited.
    pub fn max_for_team(&self, team: Team) -> Option<usize> {
        match self.max_per_team.get(&team).copied().unwrap_or(-1) {
            n if n < 0 => None,
            n => Some(n as usize),
        }
    }
}

/// Special item (Zeus) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SpecialItemConfig {
    #[serde(rename = "EnableZeus")]
    pub enable: i32,
    #[serde(rename = "ChanceForZeusWeapon")]
    pub chance: f64,
    #[serde(rename = "MaxZeusPerTeam")]
    pub max_per_team: HashMap<Team, u32>,
}

impl Default for SpecialItemConfig {
    fn default() -> Self {
        Self {
            enable: 0,
            chance: 100.0,
            max_per_team: per_team(2),
        }
    }
}

impl SpecialItemConfig {
    pub fn is_enabled(&self) -> bool {
        self.enable > 0
    }

    pub fn max_for_team(&self, team: Team) -> usize {
        self.max_per_team.get(&team).copied().unwrap_or(0) as usize
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CacheConfig {
    /// Seconds between background flushes of dirty preferences
    pub flush_interval_secs: u64,
    pub periodic_flush_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 120,
            periodic_flush_enabled: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DatabaseConfig {
    /// Path to the SQLite preference database
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./var/data/preferences.db".to_string(),
        }
    }
}

fn per_team<T: Copy>(value: T) -> HashMap<Team, T> {
    HashMap::from([(Team::TeamA, value), (Team::TeamB, value)])
}

// ================================================================================================
// ROOT CONFIG
// ================================================================================================

/// Complete allocator configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct AllocatorConfig {
    pub weapons: WeaponsConfig,
    pub round_types: RoundTypesConfig,
    #[serde(rename = "AWP")]
    pub awp: ScarceCategoryConfig,
    #[serde(rename = "SSG")]
    pub ssg: ScarceCategoryConfig,
    pub enemy_stuff: CrossTeamConfig,
    pub zeus: SpecialItemConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
}

impl AllocatorConfig {
    /// Loads and validates configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Validation warnings are logged.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let config = if path.exists() {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
            Self::from_json(&json)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses configuration without validating it.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Parse config failed: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Serialize config failed: {}", e))
    }

    /// Rejects configurations that could misbehave mid-round.
    ///
    /// # Returns
    /// - `Ok(warnings)`: non-fatal issues, already logged
    /// - `Err(message)`: the first fatal issue found
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let pct_sum: u32 = self.round_types.percentages.values().sum();
        if pct_sum != 100 {
            return Err(format!(
                "'RoundTypePercentages' values must add up to 100 (got {})",
                pct_sum
            ));
        }

        check_chance("ChanceForAwpWeapon", self.awp.chance)?;
        check_chance("ChanceForSsgWeapon", self.ssg.chance)?;
        check_chance("ChanceForEnemyStuff", self.enemy_stuff.chance)?;
        check_chance("ChanceForZeusWeapon", self.zeus.chance)?;

        check_access_mode("EnableAwp", self.awp.enable)?;
        check_access_mode("EnableSsg", self.ssg.enable)?;
        check_access_mode("EnableEnemyStuff", self.enemy_stuff.enable)?;

        for (team, max) in &self.enemy_stuff.max_per_team {
            if *max < -1 {
                return Err(format!(
                    "'MaxEnemyStuffPerTeam.{}' must be -1 (for unlimited) or a non-negative number",
                    team
                ));
            }
        }

        if self.cache.flush_interval_secs == 0 {
            return Err("'FlushIntervalSecs' must be greater than zero".to_string());
        }

        let mut warnings = Vec::new();
        for team in Team::PLAYING {
            warnings.extend(self.validate_default_weapons(team)?);
        }
        for warning in &warnings {
            warn!("[CONFIG WARNING] {}", warning);
        }

        Ok(warnings)
    }

    fn validate_default_weapons(&self, team: Team) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        let defaults = match self.weapons.default_weapons.get(&team) {
            Some(defaults) => defaults,
            None => {
                warnings.push(format!("Missing {} in DefaultWeapons config.", team));
                return Ok(warnings);
            }
        };

        if defaults.contains_key(&AllocationType::Preferred) {
            return Err(format!(
                "Preferred is not a valid default weapon allocation type for config DefaultWeapons.{}.",
                team
            ));
        }

        for allocation_type in AllocationType::WITH_DEFAULTS {
            let weapon = match defaults.get(&allocation_type) {
                Some(weapon) => *weapon,
                None => {
                    warnings.push(format!(
                        "Missing {} in DefaultWeapons.{} config.",
                        allocation_type, team
                    ));
                    continue;
                }
            };

            if !weapon.is_weapon() {
                return Err(format!(
                    "{} is not a valid weapon in config DefaultWeapons.{}.{}.",
                    weapon, team, allocation_type
                ));
            }

            if !self.weapons.usable_weapons.contains(&weapon) {
                warnings.push(format!(
                    "{} in the DefaultWeapons.{}.{} config is not in the UsableWeapons list.",
                    weapon, team, allocation_type
                ));
            }
        }

        Ok(warnings)
    }

    pub fn can_players_select_weapons(&self) -> bool {
        self.selection_enabled(SelectionType::PlayerChoice)
    }

    pub fn can_assign_random_weapons(&self) -> bool {
        self.selection_enabled(SelectionType::Random)
    }

    pub fn can_assign_default_weapons(&self) -> bool {
        self.selection_enabled(SelectionType::Default)
    }

    fn selection_enabled(&self, selection: SelectionType) -> bool {
        self.weapons.allowed_weapon_selection_types.contains(&selection)
    }
}

fn check_chance(name: &str, value: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("'{}' must be between 0 and 100", name));
    }
    Ok(())
}

fn check_access_mode(name: &str, value: i32) -> Result<(), String> {
    if !(0..=2).contains(&value) {
        return Err(format!(
            "'{}' must be 0 (disabled), 1 (everyone), or 2 (vip)",
            name
        ));
    }
    Ok(())
}
