//! The adventure orchestrator.
//!
//! One `Adventure` drives one session end to end: character creation, then
//! repeated battle / village / level-up cycles until the player falls, the
//! session is force-ended from outside, or the escalating natural-ending
//! policy fires. Every player interaction is a suspension point with a
//! timeout and a documented fallback; every generation call degrades to a
//! local substitute. The player never sees a raw error.

use crate::character::Character;
use crate::combat::{compute_damage, estimate_attack_effectiveness, CombatStats};
use crate::encounter::{Encounter, EncounterGenerator};
use crate::generate::Generator;
use crate::messenger::{Messenger, MessengerError};
use crate::persist::{PersistError, PlayerRecord, PlayerStore};
use crate::session::{EndSignal, SessionConfig};
use crate::village::Village;
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

/// Chance that a village visit is skipped after a battle.
const VILLAGE_SKIP_PROBABILITY: f64 = 0.7;

/// Chance of a level-up after each completed cycle.
const LEVEL_UP_PROBABILITY: f64 = 0.3;

/// Battle rounds after which strikes finish their target outright.
const GUARANTEED_KILL_ROUND: u32 = 7;

/// Loot granted for each defeated monster.
const LOOT_POOL: [&str; 3] = ["Health Potion", "Strength Elixir", "Defense Charm"];

/// How many recent story entries feed generation context.
const STORY_CONTEXT_WINDOW: usize = 5;

const VILLAGE_MENU: &str = "What would you like to do?\n\
    1. Visit the healer\n\
    2. Visit the shop\n\
    3. Leave village";

/// Errors from running an adventure.
///
/// Generation failures never appear here; they are recovered with local
/// fallbacks inside the loop.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// How an adventure concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdventureOutcome {
    /// The player's hit points ran out.
    Defeated,
    /// The escalating ending policy fired.
    Ended,
    /// The session was ended from outside.
    ForceEnded,
}

// ============================================================================
// Ending policy
// ============================================================================

/// Escalating natural-ending policy.
///
/// Starts at 10% and doubles on every round it does not fire, without a
/// cap, so an ending becomes certain after a handful of rounds. Only
/// eligible to fire after round 3.
#[derive(Debug, Clone)]
pub struct EndPolicy {
    probability: f64,
}

impl EndPolicy {
    pub fn new() -> Self {
        Self { probability: 0.10 }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn reset(&mut self) {
        self.probability = 0.10;
    }

    /// Roll for a natural ending this round.
    ///
    /// Doubles the probability whenever the ending does not fire.
    pub fn roll(&mut self, round: u32) -> bool {
        if round > 3 && rand::thread_rng().gen::<f64>() < self.probability {
            return true;
        }
        self.probability *= 2.0;
        false
    }
}

impl Default for EndPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Roll the village skip gate. True means the visit is skipped, which
/// happens about 70% of the time.
pub fn roll_village_skip() -> bool {
    rand::thread_rng().gen::<f64>() < VILLAGE_SKIP_PROBABILITY
}

// ============================================================================
// Target selection
// ============================================================================

/// A validated combat selection: which monster, and how the attack is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChoice {
    /// Zero-based index into the encounter's monster list.
    pub index: usize,
    /// The player's free-text description of the attack.
    pub description: String,
}

impl TargetChoice {
    /// Parse "2 I lunge at its flank" into a validated choice.
    ///
    /// The leading token is the one-based target number; the rest is the
    /// attack description. Rejects missing, out-of-range, and already
    /// defeated targets with a message suitable for re-prompting.
    pub fn parse(input: &str, encounter: &Encounter) -> Result<TargetChoice, String> {
        let trimmed = input.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest),
            None => (trimmed, ""),
        };

        let number: usize = head
            .parse()
            .map_err(|_| "Lead with the target number, like: 1 I swing my sword".to_string())?;

        if number == 0 || number > encounter.monsters.len() {
            return Err(format!("There is no target {number}."));
        }

        let index = number - 1;
        if !encounter.monsters[index].is_alive() {
            return Err(format!(
                "{} is already defeated. Pick a living target.",
                encounter.monsters[index].name
            ));
        }

        Ok(TargetChoice {
            index,
            description: rest.trim().to_string(),
        })
    }
}

enum PlayerAction {
    /// Timed out: strike the nearest foe with the formulaic resolver.
    Auto,
    /// A validated selection with an attack description.
    Strike(TargetChoice),
}

// ============================================================================
// The adventure
// ============================================================================

/// One adventure session.
///
/// Owns its messenger, its accumulated monster templates, its village, and
/// its combat ledger for the lifetime of the session; nothing is shared
/// with concurrent adventures.
pub struct Adventure<M: Messenger> {
    messenger: M,
    generator: Option<Box<dyn Generator>>,
    config: SessionConfig,
    end_signal: EndSignal,
    store: Option<PlayerStore>,
    user_id: Option<String>,
    forge: EncounterGenerator,
    village: Village,
    end_policy: EndPolicy,
    round: u32,
    story_log: Vec<String>,
}

impl<M: Messenger> Adventure<M> {
    pub fn new(messenger: M, config: SessionConfig) -> Self {
        Self {
            messenger,
            generator: None,
            config,
            end_signal: EndSignal::new(),
            store: None,
            user_id: None,
            forge: EncounterGenerator::new(),
            village: Village::new(),
            end_policy: EndPolicy::new(),
            round: 0,
            story_log: Vec::new(),
        }
    }

    /// Attach a content generator for monsters, narration, and the shop.
    pub fn with_generator(mut self, generator: Box<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Attach a player store for level carry-over.
    pub fn with_store(mut self, store: PlayerStore, user_id: impl Into<String>) -> Self {
        self.store = Some(store);
        self.user_id = Some(user_id.into());
        self
    }

    /// Use an externally owned end signal (from the session dispatcher).
    pub fn with_end_signal(mut self, signal: EndSignal) -> Self {
        self.end_signal = signal;
        self
    }

    /// The signal that force-ends this adventure.
    pub fn end_signal(&self) -> EndSignal {
        self.end_signal.clone()
    }

    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn messenger_mut(&mut self) -> &mut M {
        &mut self.messenger
    }

    /// Take the messenger back when the adventure is over.
    pub fn into_messenger(self) -> M {
        self.messenger
    }

    /// Run the adventure to completion.
    pub async fn run(&mut self) -> Result<AdventureOutcome, StoryError> {
        tracing::info!("adventure starting");
        self.end_policy.reset();
        self.round = 0;
        self.story_log.clear();

        let mut character = self.create_character().await?;
        let mut stats = CombatStats::for_character(&character);

        self.messenger
            .send(&format!(
                "Welcome {}, Level {} {}!",
                character.name, character.level, character.class
            ))
            .await?;
        self.messenger.send_chunked(&character.stat_block()).await?;
        self.messenger
            .send(&format!("Combat Stats: {}", stats.summary()))
            .await?;

        loop {
            self.round += 1;

            if self.end_signal.is_triggered() {
                tracing::info!(round = self.round, "adventure force-ended");
                self.send_ending("The tale is cut short, its last page left unwritten.")
                    .await?;
                return Ok(AdventureOutcome::ForceEnded);
            }

            if self.end_policy.roll(self.round) {
                tracing::info!(round = self.round, "natural ending fired");
                self.send_ending("Your long road finds its destined end at last.")
                    .await?;
                return Ok(AdventureOutcome::Ended);
            }

            let survived = self.run_battle(&mut character, &mut stats).await?;
            if !survived {
                tracing::info!(round = self.round, "player defeated");
                return Ok(AdventureOutcome::Defeated);
            }

            if roll_village_skip() {
                tracing::debug!("village skipped this cycle");
            } else {
                self.visit_village(&mut character, &mut stats).await?;
            }

            if rand::thread_rng().gen::<f64>() < LEVEL_UP_PROBABILITY {
                let message = character.level_up();
                self.messenger.send(&message).await?;
                stats.relevel(&character);
                self.messenger
                    .send(&format!("Combat Stats: {}", stats.summary()))
                    .await?;
                self.save_level(&character).await;
            }
        }
    }

    // ========================================================================
    // Character creation
    // ========================================================================

    async fn create_character(&mut self) -> Result<Character, StoryError> {
        let record = self.load_record().await;

        self.messenger
            .send(
                "A new adventure begins! Describe the hero you'd like to play \
                 (class, temperament, anything) -- or stay silent and let fate decide.",
            )
            .await?;
        let preference = self
            .messenger
            .await_reply(self.config.preference_timeout)
            .await?;

        let mut character = match preference {
            Some(text) => self.generate_character(&text).await,
            None => {
                tracing::debug!("no character preference given, rolling randomly");
                Character::random()
            }
        };

        if let Some(record) = record {
            if record.level > character.level {
                character.level = record.level;
                self.messenger
                    .send(&format!(
                        "Your past deeds precede you: you begin at Level {}.",
                        character.level
                    ))
                    .await?;
            }
        }
        self.save_record(&character).await;

        let context = Self::context_of(&self.story_log);
        if let Some(generator) = self.generator.as_deref_mut() {
            match generator.theme_header(&context).await {
                Ok(generated) => {
                    let theme = generated.into_inner();
                    self.story_log.push(theme.clone());
                    self.messenger.send_chunked(&theme).await?;
                }
                Err(error) => tracing::warn!(%error, "theme generation failed, skipping header"),
            }
        }

        Ok(character)
    }

    async fn generate_character(&mut self, preference: &str) -> Character {
        let context = Self::context_of(&self.story_log);
        match self.generator.as_deref_mut() {
            Some(generator) => match generator.character(&context, preference).await {
                Ok(generated) => {
                    if generated.is_fallback() {
                        tracing::warn!("character generation degraded to a random roll");
                    }
                    generated.into_inner()
                }
                Err(error) => {
                    tracing::warn!(%error, "character generation failed, rolling randomly");
                    Character::random()
                }
            },
            None => Character::random(),
        }
    }

    // ========================================================================
    // Battle
    // ========================================================================

    /// Run one battle. Returns false if the player was defeated.
    async fn run_battle(
        &mut self,
        character: &mut Character,
        stats: &mut CombatStats,
    ) -> Result<bool, StoryError> {
        let context = Self::context_of(&self.story_log);
        let mut encounter = self
            .forge
            .generate(self.generator.as_deref_mut(), &context)
            .await;

        let narration = match self.generator.as_deref_mut() {
            Some(generator) => {
                match generator.narrative(&context, &encounter.context_line()).await {
                    Ok(generated) => Some(generated.into_inner()),
                    Err(error) => {
                        tracing::warn!(%error, "narrative generation failed, using storyline seed");
                        None
                    }
                }
            }
            None => None,
        };
        let storyline = narration.unwrap_or_else(|| encounter.storyline.clone());
        self.story_log.push(storyline.clone());

        self.messenger.send_chunked(&storyline).await?;
        self.messenger
            .send(&format!("Location: {}", encounter.setting))
            .await?;
        self.messenger
            .send(&format!("You encounter:\n{}", encounter.roster()))
            .await?;

        let mut battle_round = 0u32;
        while encounter.any_alive() && stats.current_hp > 0 {
            battle_round += 1;

            let action = self.request_action(&encounter).await?;
            let (target_index, description) = match action {
                PlayerAction::Auto => match encounter.first_living() {
                    Some(index) => (index, None),
                    None => break,
                },
                PlayerAction::Strike(choice) => (choice.index, Some(choice.description)),
            };

            let target = &mut encounter.monsters[target_index];
            let damage = if battle_round > GUARANTEED_KILL_ROUND {
                tracing::debug!(round = battle_round, "combat running long, finishing blow");
                target.current_hp
            } else {
                match description {
                    None => compute_damage(stats.attack, target.defense),
                    Some(ref text) => match self.generator.as_deref_mut() {
                        Some(generator) => {
                            let estimate = estimate_attack_effectiveness(generator, text).await;
                            if estimate < 0.0 {
                                self.messenger
                                    .send("A strange force swallows your attack; nothing happens.")
                                    .await?;
                                0
                            } else {
                                estimate as i32
                            }
                        }
                        None => compute_damage(stats.attack, target.defense),
                    },
                }
            };

            let target = &mut encounter.monsters[target_index];
            let killed = target.take_damage(damage);
            let target_name = target.name.clone();
            self.messenger
                .send(&format!(
                    "{} attacks {} for {} damage!",
                    character.name, target_name, damage
                ))
                .await?;

            if killed {
                self.messenger
                    .send(&format!("{target_name} has been defeated!"))
                    .await?;

                let loot = *LOOT_POOL.choose(&mut rand::thread_rng()).unwrap();
                let loot_message = character.add_item(loot);
                self.messenger.send(&loot_message).await?;

                let reward = rand::thread_rng().gen_range(20..=50);
                stats.coins += reward;
                self.messenger
                    .send(&format!("You loot {reward} coins."))
                    .await?;
            }

            // Every surviving monster strikes back, in roster order.
            for monster in &encounter.monsters {
                if !monster.is_alive() {
                    continue;
                }
                let damage = compute_damage(monster.attack, stats.defense);
                stats.current_hp -= damage;
                self.messenger
                    .send(&format!(
                        "{} attacks {} for {} damage!",
                        monster.name, character.name, damage
                    ))
                    .await?;

                if stats.is_defeated() {
                    self.messenger
                        .send(&format!("{} has been defeated!", character.name))
                        .await?;
                    return Ok(false);
                }
            }
        }

        self.messenger
            .send(&format!(
                "Victory! You survived with {} HP remaining!",
                stats.current_hp
            ))
            .await?;
        self.messenger
            .send(&format!("You now have {} coins!", stats.coins))
            .await?;
        Ok(true)
    }

    /// Ask for a target until the player answers validly or time runs out.
    async fn request_action(&mut self, encounter: &Encounter) -> Result<PlayerAction, StoryError> {
        loop {
            self.messenger
                .send(&format!(
                    "{}\nChoose a target by number and describe your attack \
                     (e.g. '1 I drive my blade home'):",
                    encounter.roster()
                ))
                .await?;

            match self.messenger.await_reply(self.config.attack_timeout).await? {
                None => {
                    self.messenger
                        .send("No orders arrive; you lunge at the nearest foe.")
                        .await?;
                    return Ok(PlayerAction::Auto);
                }
                Some(text) => match TargetChoice::parse(&text, encounter) {
                    Ok(choice) => return Ok(PlayerAction::Strike(choice)),
                    Err(message) => self.messenger.send(&message).await?,
                },
            }
        }
    }

    // ========================================================================
    // Village
    // ========================================================================

    async fn visit_village(
        &mut self,
        character: &mut Character,
        stats: &mut CombatStats,
    ) -> Result<(), StoryError> {
        self.messenger
            .send("You arrive at the village to rest and recover...")
            .await?;

        let context = Self::context_of(&self.story_log);
        if let Some(generator) = self.generator.as_deref_mut() {
            if !self.village.refresh_catalog(generator, &context).await {
                tracing::warn!("village shop fell back to basic stock");
            }
        }

        loop {
            self.messenger.send(VILLAGE_MENU).await?;

            let Some(reply) = self.messenger.await_reply(self.config.choice_timeout).await? else {
                self.messenger
                    .send("The villagers wait patiently for your answer.")
                    .await?;
                continue;
            };

            match reply.trim().to_lowercase().as_str() {
                "1" | "heal" | "healer" => {
                    let missing = stats.max_hp - stats.current_hp;
                    let outcome = self.village.heal_player(character, stats, missing);
                    self.messenger.send(&outcome.message).await?;
                }
                "2" | "shop" => {
                    self.messenger
                        .send_chunked(&self.village.shop_listing(character))
                        .await?;
                    self.messenger
                        .send("Which item would you like to buy?")
                        .await?;
                    match self.messenger.await_reply(self.config.choice_timeout).await? {
                        Some(item_name) => {
                            let outcome = self.village.buy_item(character, stats, &item_name);
                            self.messenger.send(&outcome.message).await?;
                        }
                        None => {
                            self.messenger
                                .send("The shopkeeper shrugs as you wander off.")
                                .await?;
                        }
                    }
                }
                "3" | "leave" => {
                    self.messenger.send("You leave the village behind.").await?;
                    return Ok(());
                }
                _ => {
                    self.messenger
                        .send("Choose 1 (healer), 2 (shop), or 3 (leave).")
                        .await?;
                }
            }
        }
    }

    // ========================================================================
    // Endings and persistence
    // ========================================================================

    async fn send_ending(&mut self, fallback_line: &str) -> Result<(), StoryError> {
        let context = Self::context_of(&self.story_log);
        let ending = match self.generator.as_deref_mut() {
            Some(generator) => match generator.ending(&context).await {
                Ok(generated) => generated.into_inner(),
                Err(error) => {
                    tracing::warn!(%error, "ending generation failed, using stock line");
                    fallback_line.to_string()
                }
            },
            None => fallback_line.to_string(),
        };

        self.messenger.send_chunked(&ending).await?;
        self.messenger
            .send("The adventure has ended. Thanks for playing!")
            .await?;
        Ok(())
    }

    async fn load_record(&self) -> Option<PlayerRecord> {
        let (store, user_id) = (self.store.as_ref()?, self.user_id.as_ref()?);
        match store.get(user_id).await {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%error, "failed to load player record");
                None
            }
        }
    }

    async fn save_record(&self, character: &Character) {
        let (Some(store), Some(user_id)) = (self.store.as_ref(), self.user_id.as_ref()) else {
            return;
        };
        let record = PlayerRecord {
            name: character.name.clone(),
            character_class: character.class.name().to_string(),
            level: character.level,
        };
        if let Err(error) = store.put(user_id, record).await {
            tracing::warn!(%error, "failed to persist player record");
        }
    }

    async fn save_level(&self, character: &Character) {
        let (Some(store), Some(user_id)) = (self.store.as_ref(), self.user_id.as_ref()) else {
            return;
        };
        if let Err(error) = store.update_level(user_id, character.level).await {
            tracing::warn!(%error, "failed to persist level");
        }
    }

    /// Recent story entries joined for generation context.
    fn context_of(story_log: &[String]) -> String {
        if story_log.is_empty() {
            return "The adventure is just beginning.".to_string();
        }
        let start = story_log.len().saturating_sub(STORY_CONTEXT_WINDOW);
        story_log[start..].join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::MonsterTemplate;

    #[test]
    fn test_end_policy_doubles_without_cap() {
        let mut policy = EndPolicy::new();
        assert!((policy.probability() - 0.10).abs() < 1e-9);

        // Rounds 1-3 are never eligible, so the roll cannot fire and the
        // probability marches 0.10 -> 0.20 -> 0.40 -> 0.80.
        assert!(!policy.roll(1));
        assert!((policy.probability() - 0.20).abs() < 1e-9);
        assert!(!policy.roll(2));
        assert!((policy.probability() - 0.40).abs() < 1e-9);
        assert!(!policy.roll(3));
        assert!((policy.probability() - 0.80).abs() < 1e-9);
    }

    #[test]
    fn test_end_policy_resets() {
        let mut policy = EndPolicy::new();
        for round in 1..=3 {
            policy.roll(round);
        }
        policy.reset();
        assert!((policy.probability() - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_end_policy_becomes_certain() {
        let mut policy = EndPolicy::new();
        // Push the probability past 1.0; the next eligible roll must fire.
        for round in 1..=4 {
            if policy.roll(round) {
                return; // fired early at 0.8, also fine
            }
        }
        assert!(policy.probability() > 1.0);
        assert!(policy.roll(5));
    }

    fn encounter_with(monsters: Vec<crate::combat::MonsterInstance>) -> Encounter {
        Encounter {
            setting: "Dark Forest".to_string(),
            storyline: "A test".to_string(),
            monsters,
        }
    }

    #[test]
    fn test_target_choice_parses_index_and_description() {
        let encounter = encounter_with(vec![
            MonsterTemplate::new("Goblin", 20, 5, 2).spawn(),
            MonsterTemplate::new("Orc", 35, 8, 4).spawn(),
        ]);

        let choice = TargetChoice::parse("2 I lunge at its flank", &encounter).unwrap();
        assert_eq!(choice.index, 1);
        assert_eq!(choice.description, "I lunge at its flank");

        // A bare number is valid; the description is just empty.
        let choice = TargetChoice::parse("1", &encounter).unwrap();
        assert_eq!(choice.index, 0);
        assert!(choice.description.is_empty());
    }

    #[test]
    fn test_target_choice_rejects_bad_input() {
        let encounter = encounter_with(vec![MonsterTemplate::new("Goblin", 20, 5, 2).spawn()]);

        assert!(TargetChoice::parse("stab the thing", &encounter).is_err());
        assert!(TargetChoice::parse("0 swing", &encounter).is_err());
        assert!(TargetChoice::parse("5 swing", &encounter).is_err());
        assert!(TargetChoice::parse("", &encounter).is_err());
    }

    #[test]
    fn test_target_choice_rejects_dead_targets() {
        let mut dead = MonsterTemplate::new("Goblin", 20, 5, 2).spawn();
        dead.take_damage(20);
        let encounter = encounter_with(vec![dead]);

        let error = TargetChoice::parse("1 hit it again", &encounter).unwrap_err();
        assert!(error.contains("already defeated"));
    }

    use crate::character::CharacterClass;
    use crate::testing::MockMessenger;

    fn adventure(messenger: MockMessenger) -> Adventure<MockMessenger> {
        Adventure::new(messenger, SessionConfig::new())
    }

    #[tokio::test]
    async fn test_run_battle_defeat_aborts_immediately() {
        // A player who cannot hurt anything and dies to the first strike.
        let mut adventure = adventure(MockMessenger::new());
        let mut character = Character::new("Doomed", CharacterClass::Warrior, 1);
        let mut stats = CombatStats::for_character(&character);
        stats.attack = 0;
        stats.defense = 0;
        stats.current_hp = 1;

        let survived = adventure
            .run_battle(&mut character, &mut stats)
            .await
            .unwrap();

        assert!(!survived);
        assert!(stats.is_defeated());
        let transcript = adventure.messenger().transcript();
        assert!(transcript.contains("Doomed has been defeated!"));
        assert!(!transcript.contains("Victory!"));
    }

    #[tokio::test]
    async fn test_run_battle_victory_grants_loot_and_coins() {
        // Overwhelming stats: every monster dies to one auto-attack and
        // nothing gets through the defense.
        let mut adventure = adventure(MockMessenger::new());
        let mut character = Character::new("Unstoppable", CharacterClass::Warrior, 1);
        let mut stats = CombatStats::for_character(&character);
        stats.attack = 10_000;
        stats.defense = 10_000;
        stats.max_hp = 10_000;
        stats.current_hp = 10_000;
        let coins_before = stats.coins;

        let survived = adventure
            .run_battle(&mut character, &mut stats)
            .await
            .unwrap();

        assert!(survived);
        assert!(stats.coins > coins_before);
        assert!(!character.inventory.is_empty());
        let transcript = adventure.messenger().transcript();
        assert!(transcript.contains("Victory!"));
        assert!(transcript.contains("has been defeated!"));
    }

    #[tokio::test]
    async fn test_battle_invalid_selection_reprompts() {
        let mut messenger = MockMessenger::new();
        // An invalid target first, then a valid one; no generator, so the
        // valid selection resolves formulaically.
        messenger.queue_reply("99 wild swing");
        let mut adventure = adventure(messenger);

        let mut character = Character::new("Hero", CharacterClass::Warrior, 1);
        let mut stats = CombatStats::for_character(&character);
        stats.attack = 10_000;
        stats.defense = 10_000;
        stats.max_hp = 10_000;
        stats.current_hp = 10_000;

        let survived = adventure
            .run_battle(&mut character, &mut stats)
            .await
            .unwrap();

        assert!(survived);
        let transcript = adventure.messenger().transcript();
        assert!(transcript.contains("There is no target 99."));
    }

    #[tokio::test]
    async fn test_village_heal_shop_and_leave() {
        let mut messenger = MockMessenger::new();
        messenger
            .queue_reply("1")
            .queue_reply("2")
            .queue_reply("Health Potion")
            .queue_timeout()
            .queue_reply("nonsense")
            .queue_reply("3");
        let mut adventure = adventure(messenger);

        let mut character = Character::new("Shopper", CharacterClass::Cleric, 1);
        let mut stats = CombatStats::for_character(&character);
        stats.current_hp = stats.max_hp - 20;
        stats.coins = 1000;

        adventure
            .visit_village(&mut character, &mut stats)
            .await
            .unwrap();

        let transcript = adventure.messenger().transcript();
        assert!(transcript.contains("Healed for"));
        assert!(transcript.contains("Bought Health Potion"));
        // Timeout and garbage both re-prompted instead of ending the visit.
        assert!(transcript.contains("wait patiently"));
        assert!(transcript.contains("Choose 1 (healer), 2 (shop), or 3 (leave)."));
        assert!(transcript.contains("You leave the village behind."));
        assert!(character.inventory.contains(&"Health Potion".to_string()));
    }

    #[test]
    fn test_context_window_keeps_recent_entries() {
        let log: Vec<String> = (0..10).map(|i| format!("entry{i}")).collect();
        let context = Adventure::<crate::testing::MockMessenger>::context_of(&log);
        assert!(context.contains("entry9"));
        assert!(!context.contains("entry4"));

        let empty = Adventure::<crate::testing::MockMessenger>::context_of(&[]);
        assert!(!empty.is_empty());
    }
}
