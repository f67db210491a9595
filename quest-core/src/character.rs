//! Player character model.
//!
//! Contains the character record (class, level, ability scores, inventory)
//! and the two ways characters come into being: local random generation and
//! parsing of generated character JSON, which may arrive wrapped in prose
//! and must never fail.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lowest value an ability score can take.
pub const STAT_FLOOR: u8 = 8;

/// Soft cap enforced on every generation and boost path.
pub const STAT_CAP: u8 = 20;

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for a player character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Parse a stat name as it appears in generated JSON payloads.
    pub fn parse(name: &str) -> Option<Ability> {
        match name.to_lowercase().as_str() {
            "strength" | "str" => Some(Ability::Strength),
            "dexterity" | "dex" => Some(Ability::Dexterity),
            "constitution" | "con" => Some(Ability::Constitution),
            "intelligence" | "int" => Some(Ability::Intelligence),
            "wisdom" | "wis" => Some(Ability::Wisdom),
            "charisma" | "cha" => Some(Ability::Charisma),
            _ => None,
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: u8) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    /// Set a score, clamping it into [STAT_FLOOR, STAT_CAP].
    pub fn set_clamped(&mut self, ability: Ability, value: i64) {
        let clamped = value.clamp(STAT_FLOOR as i64, STAT_CAP as i64) as u8;
        self.set(ability, clamped);
    }

    /// Raise a score by `amount`, clamping at the cap.
    pub fn boost(&mut self, ability: Ability, amount: u8) {
        let raised = self.get(ability).saturating_add(amount).min(STAT_CAP);
        self.set(ability, raised);
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Mage,
    Rogue,
    Cleric,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Mage => "Mage",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Cleric => "Cleric",
        }
    }

    pub fn all() -> [CharacterClass; 4] {
        [
            CharacterClass::Warrior,
            CharacterClass::Mage,
            CharacterClass::Rogue,
            CharacterClass::Cleric,
        ]
    }

    /// Parse a class name from generated JSON, case-insensitively.
    pub fn parse(name: &str) -> Option<CharacterClass> {
        match name.trim().to_lowercase().as_str() {
            "warrior" => Some(CharacterClass::Warrior),
            "mage" => Some(CharacterClass::Mage),
            "rogue" => Some(CharacterClass::Rogue),
            "cleric" => Some(CharacterClass::Cleric),
            _ => None,
        }
    }

    /// The two stats a freshly generated character of this class favors.
    pub fn favored_stats(&self) -> [Ability; 2] {
        match self {
            CharacterClass::Warrior => [Ability::Strength, Ability::Constitution],
            CharacterClass::Mage => [Ability::Intelligence, Ability::Wisdom],
            CharacterClass::Rogue => [Ability::Dexterity, Ability::Charisma],
            CharacterClass::Cleric => [Ability::Wisdom, Ability::Charisma],
        }
    }

    /// Class modifiers applied when deriving combat stats.
    ///
    /// Only the Strength, Dexterity, and Constitution entries feed the
    /// combat formulae; the rest describe flavor emphasis.
    pub fn modifiers(&self) -> &'static [(Ability, i32)] {
        match self {
            CharacterClass::Warrior => &[
                (Ability::Strength, 2),
                (Ability::Constitution, 2),
                (Ability::Dexterity, 1),
            ],
            CharacterClass::Mage => &[
                (Ability::Intelligence, 3),
                (Ability::Wisdom, 2),
                (Ability::Constitution, -1),
            ],
            CharacterClass::Rogue => &[
                (Ability::Dexterity, 3),
                (Ability::Charisma, 1),
                (Ability::Constitution, 1),
            ],
            CharacterClass::Cleric => &[
                (Ability::Wisdom, 2),
                (Ability::Charisma, 2),
                (Ability::Intelligence, 1),
            ],
        }
    }

    /// The fixed ability pool characters of this class draw from.
    pub fn ability_pool(&self) -> [&'static str; 3] {
        match self {
            CharacterClass::Warrior => ["Power Strike", "Shield Wall", "Battle Cry"],
            CharacterClass::Mage => ["Fireball", "Arcane Shield", "Mind Spike"],
            CharacterClass::Rogue => ["Backstab", "Smoke Bomb", "Pickpocket"],
            CharacterClass::Cleric => ["Divine Light", "Blessing", "Smite"],
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Generation pools
// ============================================================================

const FIRST_NAMES: [&str; 8] = [
    "Aldric", "Brenna", "Corwin", "Dessa", "Eldon", "Fiora", "Garrick", "Hale",
];

const LAST_NAMES: [&str; 8] = [
    "Ashdown",
    "Blackwood",
    "Coppervein",
    "Duskmere",
    "Emberfall",
    "Frostholm",
    "Greywind",
    "Hollowbrook",
];

/// Pool of possible starting items, drawn with replacement.
const STARTING_ITEMS: [&str; 8] = [
    "Health Potion",
    "Rope",
    "Torch",
    "Rations",
    "Lockpick",
    "Map Fragment",
    "Lucky Charm",
    "Whetstone",
];

// ============================================================================
// Character
// ============================================================================

/// A player character for one adventure session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: PlayerId,
    pub name: String,
    pub class: CharacterClass,
    pub level: u32,
    pub stats: AbilityScores,
    pub inventory: Vec<String>,
    pub abilities: Vec<String>,
    pub background: Option<String>,
}

impl Character {
    /// Create a character with default scores at the given level.
    pub fn new(name: impl Into<String>, class: CharacterClass, level: u32) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            class,
            level: level.max(1),
            stats: AbilityScores::default(),
            inventory: Vec::new(),
            abilities: Vec::new(),
            background: None,
        }
    }

    /// Advance one level, raising Strength and Dexterity by one each.
    pub fn level_up(&mut self) -> String {
        self.level += 1;
        self.stats.boost(Ability::Strength, 1);
        self.stats.boost(Ability::Dexterity, 1);
        format!("{} has leveled up to Level {}!", self.name, self.level)
    }

    /// Append an item to the inventory.
    pub fn add_item(&mut self, item: impl Into<String>) -> String {
        let item = item.into();
        let message = format!("{} received {}!", self.name, item);
        self.inventory.push(item);
        message
    }

    /// Human-readable stat block.
    pub fn stat_block(&self) -> String {
        let mut lines = vec![
            format!("Name: {}", self.name),
            format!("Class: {}", self.class),
            format!("Level: {}", self.level),
        ];
        let stats = Ability::all()
            .iter()
            .map(|&a| format!("{} {}", a.name(), self.stats.get(a)))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Stats: {stats}"));
        if !self.abilities.is_empty() {
            lines.push(format!("Abilities: {}", self.abilities.join(", ")));
        }
        if self.inventory.is_empty() {
            lines.push("Inventory: (empty)".to_string());
        } else {
            lines.push(format!("Inventory: {}", self.inventory.join(", ")));
        }
        if let Some(ref background) = self.background {
            lines.push(format!("Background: {background}"));
        }
        lines.join("\n")
    }

    /// Generate a random character.
    ///
    /// Stats draw a base in [8,12] with a [2,4] bonus on the class's two
    /// favored stats, capped at 20. Grants 2-4 starting items and exactly
    /// two class abilities.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();

        let first = FIRST_NAMES.choose(&mut rng).unwrap();
        let last = LAST_NAMES.choose(&mut rng).unwrap();
        let class = *CharacterClass::all().choose(&mut rng).unwrap();
        let level = rng.gen_range(1..=5);

        let mut character = Character::new(format!("{first} {last}"), class, level);

        let favored = class.favored_stats();
        for ability in Ability::all() {
            let mut value = rng.gen_range(8..=12u8);
            if favored.contains(&ability) {
                value += rng.gen_range(2..=4u8);
            }
            character.stats.set(ability, value.min(STAT_CAP));
        }

        let item_count = rng.gen_range(2..=4);
        for _ in 0..item_count {
            let item = STARTING_ITEMS.choose(&mut rng).unwrap();
            character.inventory.push((*item).to_string());
        }

        character.abilities = class
            .ability_pool()
            .choose_multiple(&mut rng, 2)
            .map(|s| (*s).to_string())
            .collect();

        character
    }

    /// Build a character from a generated JSON payload.
    ///
    /// Total: any malformed input falls back to `Character::random()`.
    pub fn from_generated(value: &serde_json::Value) -> Self {
        match Self::try_from_value(value) {
            Some(character) => character,
            None => {
                tracing::warn!("generated character payload unusable, rolling a random one");
                Self::random()
            }
        }
    }

    /// Build a character from generated text that may wrap JSON in prose.
    pub fn from_generated_text(text: &str) -> Self {
        let parsed = extract_json_object(text).and_then(|span| serde_json::from_str(span).ok());
        match parsed {
            Some(value) => Self::from_generated(&value),
            None => {
                tracing::warn!("no parseable JSON in generated character text");
                Self::random()
            }
        }
    }

    fn try_from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;

        let name = object
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Unknown Adventurer")
            .to_string();

        let class = object
            .get("character_class")
            .or_else(|| object.get("class"))
            .and_then(|v| v.as_str())
            .and_then(CharacterClass::parse)
            .unwrap_or(CharacterClass::Warrior);

        let level = object
            .get("level")
            .and_then(|v| v.as_u64())
            .map(|l| l.max(1) as u32)
            .unwrap_or(1);

        let mut character = Character::new(name, class, level);

        if let Some(stats) = object.get("stats").and_then(|v| v.as_object()) {
            for (key, raw) in stats {
                if let (Some(ability), Some(value)) = (Ability::parse(key), raw.as_i64()) {
                    character.stats.set_clamped(ability, value);
                }
            }
        }

        if let Some(items) = object.get("inventory").and_then(|v| v.as_array()) {
            character.inventory = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
        }

        if let Some(abilities) = object.get("abilities").and_then(|v| v.as_array()) {
            character.abilities = abilities
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
        }

        character.background = object
            .get("background")
            .and_then(|v| v.as_str())
            .map(String::from);

        Some(character)
    }
}

/// Extract the first balanced `{...}` span from text.
///
/// Brace depth is tracked outside string literals so prose around (or
/// inside) the object does not confuse the scan.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
