//! Catalog entities: characters and items.
//!
//! Both are read-only from the roster engine's point of view. Runs reference
//! them by id and never own them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::{ActorId, CharacterId, ItemId};

/// A character class.
///
/// Serialized in upper case (`"PRIEST"`), which is also accepted
/// case-insensitively by [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CharacterClass {
    Warrior,
    Paladin,
    Hunter,
    Rogue,
    Priest,
    Shaman,
    Mage,
    Warlock,
    Druid,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 9] = [
        CharacterClass::Warrior,
        CharacterClass::Paladin,
        CharacterClass::Hunter,
        CharacterClass::Rogue,
        CharacterClass::Priest,
        CharacterClass::Shaman,
        CharacterClass::Mage,
        CharacterClass::Warlock,
        CharacterClass::Druid,
    ];

    /// Returns true for classes that count toward the carrier support quota.
    pub fn is_support(&self) -> bool {
        matches!(self, CharacterClass::Priest | CharacterClass::Shaman)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "WARRIOR",
            CharacterClass::Paladin => "PALADIN",
            CharacterClass::Hunter => "HUNTER",
            CharacterClass::Rogue => "ROGUE",
            CharacterClass::Priest => "PRIEST",
            CharacterClass::Shaman => "SHAMAN",
            CharacterClass::Mage => "MAGE",
            CharacterClass::Warlock => "WARLOCK",
            CharacterClass::Druid => "DRUID",
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a class name is not one of the nine known classes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown character class: {0:?}")]
pub struct UnknownClass(pub String);

impl FromStr for CharacterClass {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CharacterClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownClass(s.to_string()))
    }
}

/// An actor-owned character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub owner: ActorId,
    pub name: String,
    pub class: CharacterClass,
    pub created_at: DateTime<Utc>,
}

impl Character {
    pub fn new(owner: ActorId, name: impl Into<String>, class: CharacterClass) -> Self {
        Character {
            id: CharacterId::generate(),
            owner,
            name: name.into(),
            class,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, actor: &ActorId) -> bool {
        &self.owner == actor
    }
}

/// A catalog item that boosted participants may reserve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Price in gold.
    pub value: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Item {
    pub fn new(name: impl Into<String>, value: u64, image_url: Option<String>) -> Self {
        Item {
            id: ItemId::generate(),
            name: name.into(),
            value,
            image_url,
        }
    }
}

/// The starter item catalog loaded by `RUN_ROSTER_SEED_ITEMS`.
pub fn starter_items() -> Vec<Item> {
    const ICONS: &str = "https://wow.zamimg.com/images/wow/icons/large";
    [
        ("Thunderfury, Blessed Blade of the Windseeker", 5000, "inv_sword_39"),
        ("Sulfuras, Hand of Ragnaros", 8000, "inv_hammer_unique_sulfuras"),
        ("Warglaives of Azzinoth", 6000, "inv_weapon_glave_01"),
        ("Atiesh, Greatstaff of the Guardian", 7000, "inv_staff_medivh"),
        ("Val'anyr, Hammer of Ancient Kings", 5500, "inv_mace_99"),
    ]
    .into_iter()
    .map(|(name, value, icon)| Item::new(name, value, Some(format!("{ICONS}/{icon}.jpg"))))
    .collect()
}
