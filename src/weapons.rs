//! Item catalogue: every weapon and equipment identifier the allocator can grant.
//!
//! Classification lives on the item itself (`ItemClass`); team membership and
//! tier reachability live in [`crate::taxonomy`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of an item, independent of team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemClass {
    Pistol,
    MidPrimary,
    FullPrimary,
    Preferred,
    Utility,
    None,
}

/// Opaque item identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponItem {
    // Pistols
    Deagle,
    P250,
    CZ75,
    DualBerettas,
    R8Revolver,
    Glock,
    Tec9,
    USPS,
    P2000,
    FiveSeven,

    // SMGs
    P90,
    UMP45,
    MP7,
    Bizon,
    MP5SD,
    Mac10,
    MP9,

    // Shotguns
    XM1014,
    Nova,
    SawedOff,
    MAG7,

    // Rifles & heavies
    AK47,
    Galil,
    SG553,
    M4A1S,
    M4A4,
    Famas,
    AUG,
    M249,
    Negev,

    // Snipers
    AWP,
    #[serde(alias = "Scout")]
    SSG08,
    G3SG1,
    SCAR20,

    // Grenades
    Flashbang,
    HE,
    Molotov,
    Incendiary,
    Smoke,
    Decoy,

    // Equipment
    Kevlar,
    KevlarHelmet,
    DefuseKit,
    KnifeT,
    KnifeCT,
    Zeus,
}

use WeaponItem::*;

const ALL_ITEMS: [WeaponItem; 46] = [
    Deagle, P250, CZ75, DualBerettas, R8Revolver, Glock, Tec9, USPS, P2000, FiveSeven, P90, UMP45,
    MP7, Bizon, MP5SD, Mac10, MP9, XM1014, Nova, SawedOff, MAG7, AK47, Galil, SG553, M4A1S, M4A4,
    Famas, AUG, M249, Negev, AWP, SSG08, G3SG1, SCAR20, Flashbang, HE, Molotov, Incendiary, Smoke,
    Decoy, Kevlar, KevlarHelmet, DefuseKit, KnifeT, KnifeCT, Zeus,
];

/// Search aliases that resolve to exactly one item.
const NAME_OVERRIDES: [(&str, WeaponItem); 6] = [
    ("m4a1", M4A1S),
    ("m4a1-s", M4A1S),
    ("scout", SSG08),
    ("krieg", SG553),
    ("autosnipert", G3SG1),
    ("autosniperct", SCAR20),
];

impl WeaponItem {
    /// Every known item in catalogue order.
    pub fn all() -> &'static [WeaponItem] {
        &ALL_ITEMS
    }

    /// Items that count as weapons (pistols through snipers).
    pub fn all_weapons() -> impl Iterator<Item = WeaponItem> {
        ALL_ITEMS.iter().copied().filter(|item| item.is_weapon())
    }

    pub fn class(&self) -> ItemClass {
        match self {
            Deagle | P250 | CZ75 | DualBerettas | R8Revolver | Glock | Tec9 | USPS | P2000
            | FiveSeven => ItemClass::Pistol,
            P90 | UMP45 | MP7 | Bizon | MP5SD | Mac10 | MP9 | XM1014 | Nova | SawedOff | MAG7 => {
                ItemClass::MidPrimary
            }
            AK47 | Galil | SG553 | M4A1S | M4A4 | Famas | AUG | M249 | Negev => {
                ItemClass::FullPrimary
            }
            AWP | SSG08 | G3SG1 | SCAR20 => ItemClass::Preferred,
            Flashbang | HE | Molotov | Incendiary | Smoke | Decoy => ItemClass::Utility,
            Kevlar | KevlarHelmet | DefuseKit | KnifeT | KnifeCT | Zeus => ItemClass::None,
        }
    }

    #[inline]
    pub fn is_weapon(&self) -> bool {
        matches!(
            self.class(),
            ItemClass::Pistol | ItemClass::MidPrimary | ItemClass::FullPrimary | ItemClass::Preferred
        )
    }

    pub fn is_smg(&self) -> bool {
        matches!(self, P90 | UMP45 | MP7 | Bizon | MP5SD | Mac10 | MP9)
    }

    pub fn is_shotgun(&self) -> bool {
        matches!(self, XM1014 | Nova | SawedOff | MAG7)
    }

    /// Display name shown to players.
    pub fn name(&self) -> &'static str {
        match self {
            Deagle => "Deagle",
            P250 => "P250",
            CZ75 => "CZ75",
            DualBerettas => "Dualies",
            R8Revolver => "R8",
            Glock => "Glock",
            Tec9 => "Tec9",
            USPS => "USPS",
            P2000 => "P2000",
            FiveSeven => "FiveSeven",
            P90 => "P90",
            UMP45 => "UMP45",
            MP7 => "MP7",
            Bizon => "Bizon",
            MP5SD => "MP5",
            Mac10 => "Mac10",
            MP9 => "MP9",
            XM1014 => "XM1014",
            Nova => "Nova",
            SawedOff => "SawedOff",
            MAG7 => "MAG7",
            AK47 => "AK47",
            Galil => "Galil",
            SG553 => "SG553",
            M4A1S => "M4A1S",
            M4A4 => "M4A4",
            Famas => "Famas",
            AUG => "AUG",
            M249 => "M249",
            Negev => "Negev",
            AWP => "AWP",
            SSG08 => "SSG08",
            G3SG1 => "G3SG1",
            SCAR20 => "SCAR20",
            Flashbang => "Flashbang",
            HE => "HE",
            Molotov => "Molotov",
            Incendiary => "Incendiary",
            Smoke => "Smoke",
            Decoy => "Decoy",
            Kevlar => "Kevlar",
            KevlarHelmet => "KevlarHelmet",
            DefuseKit => "DefuseKit",
            KnifeT => "KnifeT",
            KnifeCT => "KnifeCT",
            Zeus => "Zeus",
        }
    }

    /// Engine entity name used when granting the item.
    pub fn entity_name(&self) -> &'static str {
        match self {
            Deagle => "weapon_deagle",
            P250 => "weapon_p250",
            CZ75 => "weapon_cz75a",
            DualBerettas => "weapon_elite",
            R8Revolver => "weapon_revolver",
            Glock => "weapon_glock",
            Tec9 => "weapon_tec9",
            USPS => "weapon_usp_silencer",
            P2000 => "weapon_hkp2000",
            FiveSeven => "weapon_fiveseven",
            P90 => "weapon_p90",
            UMP45 => "weapon_ump45",
            MP7 => "weapon_mp7",
            Bizon => "weapon_bizon",
            MP5SD => "weapon_mp5sd",
            Mac10 => "weapon_mac10",
            MP9 => "weapon_mp9",
            XM1014 => "weapon_xm1014",
            Nova => "weapon_nova",
            SawedOff => "weapon_sawedoff",
            MAG7 => "weapon_mag7",
            AK47 => "weapon_ak47",
            Galil => "weapon_galilar",
            SG553 => "weapon_sg556",
            M4A1S => "weapon_m4a1_silencer",
            M4A4 => "weapon_m4a1",
            Famas => "weapon_famas",
            AUG => "weapon_aug",
            M249 => "weapon_m249",
            Negev => "weapon_negev",
            AWP => "weapon_awp",
            SSG08 => "weapon_ssg08",
            G3SG1 => "weapon_g3sg1",
            SCAR20 => "weapon_scar20",
            Flashbang => "weapon_flashbang",
            HE => "weapon_hegrenade",
            Molotov => "weapon_molotov",
            Incendiary => "weapon_incgrenade",
            Smoke => "weapon_smokegrenade",
            Decoy => "weapon_decoy",
            Kevlar => "item_kevlar",
            KevlarHelmet => "item_assaultsuit",
            DefuseKit => "item_defuser",
            KnifeT => "weapon_knife_t",
            KnifeCT => "weapon_knife",
            Zeus => "weapon_taser",
        }
    }

    /// Finds weapons whose name contains `needle` (case-insensitive).
    ///
    /// A leading `weapon_` is ignored, and a handful of aliases resolve
    /// directly to a single item. Non-weapon items are never returned.
    pub fn find_by_name(needle: &str) -> Vec<WeaponItem> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        if let Some((_, item)) = NAME_OVERRIDES.iter().find(|(alias, _)| *alias == needle) {
            return vec![*item];
        }

        if let Some(item) = Self::all_weapons().find(|item| item.entity_name() == needle) {
            return vec![item];
        }

        let stripped = needle.strip_prefix("weapon_").unwrap_or(&needle).to_string();
        Self::all_weapons()
            .filter(|item| {
                let lowered = item.name().to_lowercase();
                lowered.contains(&needle) || lowered.contains(&stripped)
            })
            .collect()
    }
}

impl fmt::Display for WeaponItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
