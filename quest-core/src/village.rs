//! Village economy: healing and the shop.
//!
//! Prices bend to Charisma and level, healing effectiveness to Wisdom and
//! level, both capped. Purchases and healing are transactions against the
//! combat ledger: they are rejected outright when unaffordable, never
//! partially applied.

use crate::character::{Ability, Character, STAT_CAP};
use crate::combat::CombatStats;
use crate::generate::{Generated, GeneratedShopItem, Generator};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Cap on the total shop discount.
pub const MAX_DISCOUNT: f64 = 0.30;

/// Cap on the total healing bonus.
pub const MAX_HEALING_BONUS: f64 = 0.50;

/// Flat service fee added to every healing purchase.
const HEALING_FEE: i32 = 10;

/// Stat threshold before any special item is offered.
const SPECIAL_ITEM_GATE: u8 = 14;

// ============================================================================
// Shop items
// ============================================================================

/// An item offered by the village shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    pub name: String,
    pub price: i32,
    pub description: String,
    pub heal: Option<i32>,
    pub attack: Option<i32>,
    pub defense: Option<i32>,
    pub stat_boosts: Vec<(Ability, u8)>,
    /// Governing stat and minimum value for special items.
    pub requirement: Option<(Ability, u8)>,
}

impl ShopItem {
    pub fn new(name: impl Into<String>, price: i32, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            description: description.into(),
            heal: None,
            attack: None,
            defense: None,
            stat_boosts: Vec::new(),
            requirement: None,
        }
    }

    pub fn with_heal(mut self, amount: i32) -> Self {
        self.heal = Some(amount);
        self
    }

    pub fn with_attack(mut self, amount: i32) -> Self {
        self.attack = Some(amount);
        self
    }

    pub fn with_defense(mut self, amount: i32) -> Self {
        self.defense = Some(amount);
        self
    }

    pub fn with_boost(mut self, ability: Ability, amount: u8) -> Self {
        self.stat_boosts.push((ability, amount));
        self
    }

    pub fn with_requirement(mut self, ability: Ability, min_stat: u8) -> Self {
        self.requirement = Some((ability, min_stat));
        self
    }
}

lazy_static::lazy_static! {
    /// Items offered only to characters with a high enough governing stat.
    static ref SPECIAL_ITEMS: Vec<ShopItem> = vec![
        ShopItem::new("Arcane Tome", 200, "Pages that rearrange themselves")
            .with_boost(Ability::Intelligence, 3)
            .with_boost(Ability::Wisdom, 1)
            .with_requirement(Ability::Intelligence, 14),
        ShopItem::new("Staff of Power", 300, "Hums with barely contained force")
            .with_attack(15)
            .with_boost(Ability::Intelligence, 2)
            .with_requirement(Ability::Intelligence, 16),
        ShopItem::new("Noble's Cloak", 180, "Commands respect in any hall")
            .with_defense(5)
            .with_boost(Ability::Charisma, 2)
            .with_requirement(Ability::Charisma, 14),
        ShopItem::new("Diplomatic Seal", 250, "Opens doors words cannot")
            .with_boost(Ability::Charisma, 3)
            .with_requirement(Ability::Charisma, 16),
        ShopItem::new("Holy Symbol", 220, "Warm to the touch")
            .with_heal(50)
            .with_boost(Ability::Wisdom, 2)
            .with_requirement(Ability::Wisdom, 14),
        ShopItem::new("Prophet's Staff", 280, "Whispers of things to come")
            .with_attack(12)
            .with_boost(Ability::Wisdom, 3)
            .with_requirement(Ability::Wisdom, 16),
    ];
}

/// The catalog used when shop generation fails.
pub fn fallback_catalog() -> Vec<ShopItem> {
    vec![
        ShopItem::new("Health Potion", 50, "Restores 30 HP").with_heal(30),
        ShopItem::new("Iron Sword", 150, "Increases Attack by 10").with_attack(10),
    ]
}

/// Map a generated item into the catalog shape based on its declared type.
fn map_generated_item(raw: &GeneratedShopItem) -> ShopItem {
    let mut rng = rand::thread_rng();
    let item = ShopItem::new(
        raw.name.trim(),
        raw.price.clamp(0, i32::MAX as i64) as i32,
        raw.description.trim(),
    );

    match raw.kind.trim() {
        "Weapon" => item.with_attack(rng.gen_range(5..=15)),
        "Armor" => item.with_defense(rng.gen_range(3..=10)),
        "Potion" => item.with_heal(rng.gen_range(20..=50)),
        "Magical" => {
            let stat = *[
                Ability::Strength,
                Ability::Wisdom,
                Ability::Intelligence,
                Ability::Charisma,
            ]
            .choose(&mut rng)
            .unwrap();
            item.with_boost(stat, rng.gen_range(1..=3))
        }
        _ => item,
    }
}

// ============================================================================
// The village
// ============================================================================

/// Result of a healing or purchase attempt.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub success: bool,
    pub message: String,
}

impl TransactionOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The village: a healer and a refreshable shop.
pub struct Village {
    catalog: Vec<ShopItem>,
}

impl Village {
    /// Start with the basic catalog until a generated one arrives.
    pub fn new() -> Self {
        Self {
            catalog: fallback_catalog(),
        }
    }

    pub fn catalog(&self) -> &[ShopItem] {
        &self.catalog
    }

    /// Price multiplier from Charisma and level, discount capped at 30%.
    pub fn price_modifier(&self, character: &Character) -> f64 {
        let charisma = character.stats.charisma as f64;
        let charisma_discount = ((charisma - 10.0) * 0.01).max(0.0);
        let level_discount = character.level as f64 * 0.005;
        1.0 - (charisma_discount + level_discount).min(MAX_DISCOUNT)
    }

    /// Healing multiplier from Wisdom and level, bonus capped at 50%.
    pub fn healing_modifier(&self, character: &Character) -> f64 {
        let wisdom = character.stats.wisdom as f64;
        let wisdom_bonus = ((wisdom - 10.0) * 0.02).max(0.0);
        let level_bonus = character.level as f64 * 0.01;
        1.0 + (wisdom_bonus + level_bonus).min(MAX_HEALING_BONUS)
    }

    /// The catalog plus special items the character qualifies for.
    pub fn available_items(&self, character: &Character) -> Vec<ShopItem> {
        let mut items = self.catalog.clone();
        for special in SPECIAL_ITEMS.iter() {
            if let Some((governing, min_stat)) = special.requirement {
                let value = character.stats.get(governing);
                if value >= SPECIAL_ITEM_GATE && value >= min_stat {
                    items.push(special.clone());
                }
            }
        }
        items
    }

    /// Listing of available items with discounted prices.
    pub fn shop_listing(&self, character: &Character) -> String {
        let modifier = self.price_modifier(character);
        let mut lines = vec!["Available items in shop:".to_string()];
        for item in self.available_items(character) {
            let price = (item.price as f64 * modifier) as i32;
            lines.push(format!("- {}: {} coins ({})", item.name, price, item.description));
        }
        lines.join("\n")
    }

    /// Heal up to `requested` hit points, for a fee.
    ///
    /// Wisdom boosts the healing received, Charisma discounts the cost.
    /// Rejects without touching the ledger when the cost is unaffordable.
    pub fn heal_player(
        &self,
        character: &Character,
        stats: &mut CombatStats,
        requested: i32,
    ) -> TransactionOutcome {
        if stats.current_hp >= stats.max_hp {
            return TransactionOutcome::failure("Already at full health!");
        }

        let needed = requested.max(0).min(stats.max_hp - stats.current_hp);
        let healing_modifier = self.healing_modifier(character);
        let actual_healing = (needed as f64 * healing_modifier) as i32;

        let price_modifier = self.price_modifier(character);
        let cost = ((needed + HEALING_FEE) as f64 * price_modifier) as i32;

        if stats.coins < cost {
            return TransactionOutcome::failure(format!(
                "Not enough coins! Healing would cost {cost} coins."
            ));
        }

        stats.coins -= cost;
        stats.current_hp = (stats.current_hp + actual_healing).min(stats.max_hp);

        let bonus_pct = (healing_modifier * 100.0 - 100.0) as i32;
        let discount_pct = ((1.0 - price_modifier) * 100.0) as i32;
        TransactionOutcome::success(format!(
            "Healed for {actual_healing} HP! (Wisdom bonus: +{bonus_pct}%)\n\
             Cost: {cost} coins (Charisma discount: {discount_pct}%)"
        ))
    }

    /// Buy an item by name, applying its immediate effects.
    pub fn buy_item(
        &self,
        character: &mut Character,
        stats: &mut CombatStats,
        item_name: &str,
    ) -> TransactionOutcome {
        let item = match self
            .available_items(character)
            .into_iter()
            .find(|i| i.name.eq_ignore_ascii_case(item_name.trim()))
        {
            Some(item) => item,
            None => return TransactionOutcome::failure("Item not available!"),
        };

        let price_modifier = self.price_modifier(character);
        let final_price = (item.price as f64 * price_modifier) as i32;

        if stats.coins < final_price {
            return TransactionOutcome::failure(format!(
                "Not enough coins! {} costs {} coins.",
                item.name, final_price
            ));
        }

        stats.coins -= final_price;
        character.add_item(item.name.clone());

        let mut effects = Vec::new();
        if let Some(heal) = item.heal {
            let healing = self.heal_player(character, stats, heal);
            effects.push(healing.message);
        }
        if let Some(attack) = item.attack {
            stats.attack += attack;
            effects.push(format!("Attack increased by {attack}"));
        }
        if let Some(defense) = item.defense {
            stats.defense += defense;
            effects.push(format!("Defense increased by {defense}"));
        }
        for &(ability, amount) in &item.stat_boosts {
            character.stats.boost(ability, amount);
            effects.push(format!(
                "{} raised to {} (cap {})",
                ability.name(),
                character.stats.get(ability),
                STAT_CAP
            ));
        }

        let discount_pct = ((1.0 - price_modifier) * 100.0) as i32;
        TransactionOutcome::success(format!(
            "Bought {} for {} coins (Charisma discount: {}%)\nEffects: {}",
            item.name,
            final_price,
            discount_pct,
            if effects.is_empty() {
                "none".to_string()
            } else {
                effects.join(", ")
            }
        ))
    }

    /// Replace the catalog with freshly generated stock.
    ///
    /// Returns false when generation failed and the basic catalog was
    /// substituted instead.
    pub async fn refresh_catalog(
        &mut self,
        generator: &mut dyn Generator,
        story_context: &str,
    ) -> bool {
        match generator.shop_catalog(story_context).await {
            Ok(Generated::Fresh(items)) => {
                self.catalog = items.iter().map(map_generated_item).collect();
                true
            }
            Ok(Generated::Fallback(_, reason)) => {
                tracing::warn!(%reason, "shop generation degraded, stocking basics");
                self.catalog = fallback_catalog();
                false
            }
            Err(error) => {
                tracing::warn!(%error, "shop generation failed, stocking basics");
                self.catalog = fallback_catalog();
                false
            }
        }
    }
}

impl Default for Village {
    fn default() -> Self {
        Self::new()
    }
}
