//! Content generation through the Mistral API.
//!
//! Every creative element of an adventure (monsters, characters, narration,
//! shop stock, attack scoring) is requested from the model through the
//! [`Generator`] trait. Calls are serialized behind a minimum-interval
//! throttle, and every payload-level failure is recovered locally: callers
//! receive either a fresh value or a tagged fallback, never a surprise.

use crate::character::Character;
use crate::combat::MonsterTemplate;
use async_trait::async_trait;
use mistral::{Message, Mistral, Request};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const STORYTELLER_PROMPT: &str = include_str!("prompts/storyteller.txt");
const MONSTER_PROMPT: &str = include_str!("prompts/monster.txt");
const ATTACK_SCORE_PROMPT: &str = include_str!("prompts/attack_score.txt");
const CHARACTER_PROMPT: &str = include_str!("prompts/character.txt");
const NARRATIVE_PROMPT: &str = include_str!("prompts/narrative.txt");
const THEME_PROMPT: &str = include_str!("prompts/theme.txt");
const ENDING_PROMPT: &str = include_str!("prompts/ending.txt");
const SHOP_PROMPT: &str = include_str!("prompts/shop.txt");

/// Minimum spacing between generation requests.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1200);

/// Errors from content generation.
///
/// Only transport-level failures surface here; malformed payloads are
/// recovered inside the generator and tagged as fallbacks.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Mistral API error: {0}")]
    Api(#[from] mistral::Error),
}

/// A generated value, tagged with how it was produced.
///
/// `Fallback` carries a locally produced substitute together with the
/// reason the generated payload was unusable, so callers can log the
/// degradation without special-casing errors.
#[derive(Debug, Clone)]
pub enum Generated<T> {
    Fresh(T),
    Fallback(T, String),
}

impl<T> Generated<T> {
    pub fn into_inner(self) -> T {
        match self {
            Generated::Fresh(value) => value,
            Generated::Fallback(value, _) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Generated::Fallback(..))
    }
}

/// A shop item as generated, before mapping into the village catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedShopItem {
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The content-generation seam the adventure depends on.
///
/// [`ContentGenerator`] is the Mistral-backed implementation; tests swap in
/// a scripted one.
#[async_trait]
pub trait Generator: Send {
    /// Invent a new monster template, avoiding the existing ones.
    async fn monster_template(
        &mut self,
        existing: &[MonsterTemplate],
        story_context: &str,
    ) -> Result<Generated<MonsterTemplate>, GenerateError>;

    /// Score a free-text attack description in [3, 10].
    async fn attack_score(&mut self, description: &str)
        -> Result<Generated<u32>, GenerateError>;

    /// Generate a player character honoring the player's preferences.
    async fn character(
        &mut self,
        story_context: &str,
        preference: &str,
    ) -> Result<Generated<Character>, GenerateError>;

    /// Battle-entry narration for the given encounter, under 100 words.
    async fn narrative(
        &mut self,
        story_context: &str,
        encounter_context: &str,
    ) -> Result<Generated<String>, GenerateError>;

    /// A theme header for the adventure so far.
    async fn theme_header(&mut self, story_context: &str)
        -> Result<Generated<String>, GenerateError>;

    /// Ending narration wrapping up the adventure.
    async fn ending(&mut self, story_context: &str) -> Result<Generated<String>, GenerateError>;

    /// A fresh shop catalog in raw generated form.
    async fn shop_catalog(
        &mut self,
        story_context: &str,
    ) -> Result<Generated<Vec<GeneratedShopItem>>, GenerateError>;
}

// ============================================================================
// Mistral-backed implementation
// ============================================================================

/// Mistral-backed content generator with request throttling.
pub struct ContentGenerator {
    client: Mistral,
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl ContentGenerator {
    pub fn new(client: Mistral) -> Self {
        Self {
            client,
            min_interval: DEFAULT_MIN_INTERVAL,
            last_request: None,
        }
    }

    /// Create a generator from the MISTRAL_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerateError> {
        Ok(Self::new(Mistral::from_env()?))
    }

    /// Override the minimum spacing between requests.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Wait out the remainder of the minimum request interval.
    async fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(?wait, "throttling generation request");
                tokio::time::sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn complete(
        &mut self,
        instructions: &str,
        context: String,
        json_mode: bool,
    ) -> Result<String, GenerateError> {
        self.throttle().await;

        let mut request = Request::new(vec![
            Message::system(STORYTELLER_PROMPT),
            Message::user(format!("{context}\n\n{instructions}")),
        ]);
        if json_mode {
            request = request.with_json_mode();
        }

        let response = self.client.complete(request).await?;
        Ok(response.content)
    }
}

#[async_trait]
impl Generator for ContentGenerator {
    async fn monster_template(
        &mut self,
        existing: &[MonsterTemplate],
        story_context: &str,
    ) -> Result<Generated<MonsterTemplate>, GenerateError> {
        let roster = existing
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let context = format!("Story so far: {story_context}\nExisting monsters: {roster}");

        let text = self.complete(MONSTER_PROMPT, context, true).await?;
        match parse_template(&text) {
            Some(template) => Ok(Generated::Fresh(template)),
            None => {
                let reason = "monster payload did not parse".to_string();
                tracing::warn!(%reason, "substituting a random template");
                Ok(Generated::Fallback(fallback_template(), reason))
            }
        }
    }

    async fn attack_score(
        &mut self,
        description: &str,
    ) -> Result<Generated<u32>, GenerateError> {
        let context = format!("Player attack: {description}");
        let text = self.complete(ATTACK_SCORE_PROMPT, context, true).await?;
        match parse_score(&text) {
            Some(score) => Ok(Generated::Fresh(score)),
            None => {
                let reason = "score payload did not parse".to_string();
                tracing::warn!(%reason, "substituting a random score");
                let score = rand::thread_rng().gen_range(3..=10);
                Ok(Generated::Fallback(score, reason))
            }
        }
    }

    async fn character(
        &mut self,
        story_context: &str,
        preference: &str,
    ) -> Result<Generated<Character>, GenerateError> {
        let context = format!("Player preferences: {preference}\nStory so far: {story_context}");
        let text = self.complete(CHARACTER_PROMPT, context, true).await?;

        match crate::character::extract_json_object(&text)
            .and_then(|span| serde_json::from_str::<serde_json::Value>(span).ok())
        {
            Some(value) => Ok(Generated::Fresh(Character::from_generated(&value))),
            None => {
                let reason = "character payload did not parse".to_string();
                tracing::warn!(%reason, "rolling a random character");
                Ok(Generated::Fallback(Character::random(), reason))
            }
        }
    }

    async fn narrative(
        &mut self,
        story_context: &str,
        encounter_context: &str,
    ) -> Result<Generated<String>, GenerateError> {
        let context =
            format!("Previous stories: {story_context}\nBattle info: {encounter_context}");
        let text = self.complete(NARRATIVE_PROMPT, context, false).await?;
        Ok(Generated::Fresh(text.trim().to_string()))
    }

    async fn theme_header(
        &mut self,
        story_context: &str,
    ) -> Result<Generated<String>, GenerateError> {
        let context = format!("Previous stories: {story_context}");
        let text = self.complete(THEME_PROMPT, context, false).await?;
        Ok(Generated::Fresh(text.trim().to_string()))
    }

    async fn ending(&mut self, story_context: &str) -> Result<Generated<String>, GenerateError> {
        let context = format!("Previous stories: {story_context}");
        let text = self.complete(ENDING_PROMPT, context, false).await?;
        Ok(Generated::Fresh(text.trim().to_string()))
    }

    async fn shop_catalog(
        &mut self,
        story_context: &str,
    ) -> Result<Generated<Vec<GeneratedShopItem>>, GenerateError> {
        let context = format!("Story so far: {story_context}");
        let text = self.complete(SHOP_PROMPT, context, true).await?;
        match parse_catalog(&text) {
            Some(items) if !items.is_empty() => Ok(Generated::Fresh(items)),
            _ => {
                let reason = "catalog payload did not parse".to_string();
                tracing::warn!(%reason, "substituting the basic catalog");
                Ok(Generated::Fallback(basic_catalog(), reason))
            }
        }
    }
}

// ============================================================================
// Payload parsing and local fallbacks
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawTemplate {
    name: String,
    hp: i64,
    attack: i64,
    defense: i64,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    damage_score: i64,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    items: Vec<GeneratedShopItem>,
}

/// Parse a monster template payload, clamping stats into contract ranges.
fn parse_template(text: &str) -> Option<MonsterTemplate> {
    let span = crate::character::extract_json_object(text)?;
    let raw: RawTemplate = serde_json::from_str(span).ok()?;
    if raw.name.trim().is_empty() {
        return None;
    }
    Some(MonsterTemplate::new(
        raw.name.trim(),
        raw.hp.clamp(20, 150) as i32,
        raw.attack.clamp(5, 20) as i32,
        raw.defense.clamp(2, 12) as i32,
    ))
}

/// Parse an attack score payload, clamping into [3, 10].
fn parse_score(text: &str) -> Option<u32> {
    let span = crate::character::extract_json_object(text)?;
    let raw: RawScore = serde_json::from_str(span).ok()?;
    Some(raw.damage_score.clamp(3, 10) as u32)
}

fn parse_catalog(text: &str) -> Option<Vec<GeneratedShopItem>> {
    let span = crate::character::extract_json_object(text)?;
    let raw: RawCatalog = serde_json::from_str(span).ok()?;
    Some(raw.items)
}

const FALLBACK_MONSTER_NAMES: [&str; 6] = [
    "Shadow Stalker",
    "Bog Fiend",
    "Cinder Wisp",
    "Grave Howler",
    "Thorn Beast",
    "Mire Wretch",
];

/// A randomized template used when a generated one cannot be parsed.
pub fn fallback_template() -> MonsterTemplate {
    let mut rng = rand::thread_rng();
    let name = FALLBACK_MONSTER_NAMES.choose(&mut rng).unwrap();
    MonsterTemplate::new(
        *name,
        rng.gen_range(20..=150),
        rng.gen_range(5..=20),
        rng.gen_range(2..=12),
    )
}

/// The minimal catalog used when shop generation fails.
pub fn basic_catalog() -> Vec<GeneratedShopItem> {
    vec![
        GeneratedShopItem {
            name: "Health Potion".to_string(),
            price: 50,
            description: "Restores 30 HP".to_string(),
            kind: "Potion".to_string(),
        },
        GeneratedShopItem {
            name: "Iron Sword".to_string(),
            price: 150,
            description: "Increases Attack by 10".to_string(),
            kind: "Weapon".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template_from_prose() {
        let text = r#"Behold! {"name": "Frost Wraith", "hp": 80, "attack": 14, "defense": 7}"#;
        let template = parse_template(text).unwrap();
        assert_eq!(template.name, "Frost Wraith");
        assert_eq!(template.hp, 80);
        assert_eq!(template.attack, 14);
        assert_eq!(template.defense, 7);
    }

    #[test]
    fn test_parse_template_clamps_contract_ranges() {
        let text = r#"{"name": "Titan", "hp": 9000, "attack": 1, "defense": 50}"#;
        let template = parse_template(text).unwrap();
        assert_eq!(template.hp, 150);
        assert_eq!(template.attack, 5);
        assert_eq!(template.defense, 12);
    }

    #[test]
    fn test_parse_template_rejects_garbage() {
        assert!(parse_template("not json").is_none());
        assert!(parse_template(r#"{"name": ""}"#).is_none());
        assert!(parse_template(r#"{"name": "X", "hp": "tall"}"#).is_none());
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(r#"{"damage_score": 7}"#), Some(7));
        assert_eq!(parse_score(r#"{"damage_score": 99}"#), Some(10));
        assert_eq!(parse_score(r#"{"damage_score": 0}"#), Some(3));
        assert_eq!(parse_score("oops"), None);
    }

    #[test]
    fn test_parse_catalog() {
        let text = r#"{"items": [
            {"name": "Silver Blade", "price": 120, "description": "Gleams", "type": "Weapon"},
            {"name": "Oak Shield", "price": 90, "description": "Sturdy", "type": "Armor"}
        ]}"#;
        let items = parse_catalog(text).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, "Weapon");
        assert_eq!(items[1].price, 90);
    }

    #[test]
    fn test_fallback_template_within_contract_ranges() {
        for _ in 0..100 {
            let template = fallback_template();
            assert!((20..=150).contains(&template.hp));
            assert!((5..=20).contains(&template.attack));
            assert!((2..=12).contains(&template.defense));
            assert!(!template.name.is_empty());
        }
    }

    #[test]
    fn test_generated_tagging() {
        let fresh = Generated::Fresh(5);
        assert!(!fresh.is_fallback());
        assert_eq!(fresh.into_inner(), 5);

        let fallback = Generated::Fallback(3, "parse failed".to_string());
        assert!(fallback.is_fallback());
        assert_eq!(fallback.into_inner(), 3);
    }
}
