//! Battle scenario assembly.
//!
//! An encounter bundles a setting, a storyline seed, and a handful of live
//! monsters. The generator keeps a growing set of monster templates per
//! adventure: it tops the set up through the content generator until seven
//! are held, asks for one extra template per encounter for variety, and
//! samples instances from whatever it has accumulated.

use crate::combat::{MonsterInstance, MonsterTemplate};
use crate::generate::Generator;
use rand::seq::SliceRandom;
use rand::Rng;

/// Template count the generator tops up toward.
pub const TEMPLATE_TARGET: usize = 7;

/// Upper bound on top-up requests per encounter, so a generator that keeps
/// producing duplicates cannot stall the battle.
const TOP_UP_ATTEMPT_LIMIT: usize = 12;

const SETTINGS: [&str; 4] = [
    "Dark Forest",
    "Ancient Ruins",
    "Volcanic Cave",
    "Haunted Castle",
];

const STORYLINES: [&str; 3] = [
    "A mysterious fog surrounds you as creatures emerge from the shadows...",
    "The ancient guardian awakens, protecting its sacred grounds...",
    "You've stumbled upon a monster's lair during their feast...",
];

/// One battle instance.
#[derive(Debug, Clone)]
pub struct Encounter {
    pub setting: String,
    pub storyline: String,
    pub monsters: Vec<MonsterInstance>,
}

impl Encounter {
    pub fn any_alive(&self) -> bool {
        self.monsters.iter().any(|m| m.is_alive())
    }

    /// Index of the first living monster, if any.
    pub fn first_living(&self) -> Option<usize> {
        self.monsters.iter().position(|m| m.is_alive())
    }

    /// Numbered roster of living monsters for target selection.
    pub fn roster(&self) -> String {
        self.monsters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_alive())
            .map(|(i, m)| format!("{}. {} (HP: {}/{})", i + 1, m.name, m.current_hp, m.max_hp))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One-line description handed to the content generator.
    pub fn context_line(&self) -> String {
        let names = self
            .monsters
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("Setting: {}. Monsters: {}", self.setting, names)
    }
}

/// Assembles encounters, accumulating monster templates per adventure.
pub struct EncounterGenerator {
    templates: Vec<MonsterTemplate>,
}

impl EncounterGenerator {
    /// Start from the built-in template set.
    pub fn new() -> Self {
        Self {
            templates: MonsterTemplate::builtin_set(),
        }
    }

    pub fn templates(&self) -> &[MonsterTemplate] {
        &self.templates
    }

    /// Add a template unless an identical one is already held.
    ///
    /// Returns true when the template was new.
    pub fn add_template(&mut self, template: MonsterTemplate) -> bool {
        if self.templates.contains(&template) {
            return false;
        }
        self.templates.push(template);
        true
    }

    /// Assemble the next battle.
    ///
    /// When a content generator is available the template set is topped up
    /// to [`TEMPLATE_TARGET`] and one extra template is requested for
    /// variety. Generation failures never abort the encounter; the set as
    /// accumulated so far is used instead.
    pub async fn generate(
        &mut self,
        generator: Option<&mut (dyn Generator + 'static)>,
        story_context: &str,
    ) -> Encounter {
        if let Some(generator) = generator {
            self.top_up_templates(generator, story_context).await;
            self.request_template(generator, story_context).await;
        }

        let mut rng = rand::thread_rng();
        let count = rng.gen_range(1..=3);
        let monsters = (0..count)
            .map(|_| self.templates.choose(&mut rng).unwrap().spawn())
            .collect();

        Encounter {
            setting: (*SETTINGS.choose(&mut rng).unwrap()).to_string(),
            storyline: (*STORYLINES.choose(&mut rng).unwrap()).to_string(),
            monsters,
        }
    }

    /// Request templates until the target count is held.
    async fn top_up_templates(&mut self, generator: &mut dyn Generator, story_context: &str) {
        let mut attempts = 0;
        while self.templates.len() < TEMPLATE_TARGET && attempts < TOP_UP_ATTEMPT_LIMIT {
            attempts += 1;
            if !self.request_template(generator, story_context).await {
                break;
            }
        }
    }

    /// Request one new template; returns false on a transport failure.
    async fn request_template(
        &mut self,
        generator: &mut dyn Generator,
        story_context: &str,
    ) -> bool {
        match generator.monster_template(&self.templates, story_context).await {
            Ok(generated) => {
                let template = generated.into_inner();
                if !self.add_template(template.clone()) {
                    tracing::debug!(name = %template.name, "skipping duplicate template");
                }
                true
            }
            Err(error) => {
                tracing::warn!(%error, "template generation failed, using existing set");
                false
            }
        }
    }
}

impl Default for EncounterGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    #[tokio::test]
    async fn test_generate_without_generator_uses_builtins() {
        let mut forge = EncounterGenerator::new();
        for _ in 0..50 {
            let encounter = forge.generate(None, "").await;
            assert!((1..=3).contains(&encounter.monsters.len()));
            assert!(SETTINGS.contains(&encounter.setting.as_str()));
            assert!(STORYLINES.contains(&encounter.storyline.as_str()));
            for monster in &encounter.monsters {
                assert!(monster.is_alive());
                assert_eq!(monster.current_hp, monster.max_hp);
            }
        }
        // The set never grows without a generator.
        assert_eq!(forge.templates().len(), 3);
    }

    #[tokio::test]
    async fn test_tops_up_to_seven_templates() {
        let mut generator = ScriptedGenerator::new();
        for i in 0..10 {
            generator.queue_template(MonsterTemplate::new(format!("Beast {i}"), 30, 6, 3));
        }

        let mut forge = EncounterGenerator::new();
        forge.generate(Some(&mut generator), "the story").await;

        // 3 built-ins topped up to 7, plus one variety request.
        assert_eq!(forge.templates().len(), TEMPLATE_TARGET + 1);
    }

    #[tokio::test]
    async fn test_duplicates_are_skipped() {
        let mut forge = EncounterGenerator::new();
        assert!(!forge.add_template(MonsterTemplate::new("Goblin", 20, 5, 2)));
        assert_eq!(forge.templates().len(), 3);

        // Same name, different stats: a distinct template.
        assert!(forge.add_template(MonsterTemplate::new("Goblin", 25, 5, 2)));
        assert_eq!(forge.templates().len(), 4);
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_existing_set() {
        // An empty script means every request fails at transport level.
        let mut generator = ScriptedGenerator::new();
        let mut forge = EncounterGenerator::new();

        let encounter = forge.generate(Some(&mut generator), "").await;
        assert!(!encounter.monsters.is_empty());
        assert_eq!(forge.templates().len(), 3);
    }

    #[tokio::test]
    async fn test_variety_request_after_target_reached() {
        let mut generator = ScriptedGenerator::new();
        for i in 0..8 {
            generator.queue_template(MonsterTemplate::new(format!("Beast {i}"), 30, 6, 3));
        }

        let mut forge = EncounterGenerator::new();
        forge.generate(Some(&mut generator), "").await;
        assert_eq!(forge.templates().len(), TEMPLATE_TARGET + 1);

        // A second encounter at target still asks for one more.
        forge.generate(Some(&mut generator), "").await;
        assert_eq!(forge.templates().len(), TEMPLATE_TARGET + 2);
    }
}
