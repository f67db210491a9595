//! Turn-based adventure engine with an AI storyteller.
//!
//! This crate provides:
//! - A character model with random and AI-generated creation
//! - A combat resolver with variance-based damage
//! - Encounter assembly with a growing, AI-fed monster template set
//! - A village economy (healer and shop) driven by character stats
//! - The adventure orchestrator: battle, village, and level-up cycles
//!   with an escalating story-ending policy
//!
//! Creative content comes from the Mistral API through the [`Generator`]
//! seam; the chat platform sits behind the [`Messenger`] seam. Both degrade
//! gracefully: generation failures fall back to local content, player
//! silence falls back to sensible default actions.
//!
//! # Quick Start
//!
//! ```ignore
//! use quest_core::{Adventure, ContentGenerator, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = ContentGenerator::from_env()?;
//!     let messenger = my_platform_messenger();
//!
//!     let mut adventure = Adventure::new(messenger, SessionConfig::new())
//!         .with_generator(Box::new(generator));
//!
//!     let outcome = adventure.run().await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod character;
pub mod combat;
pub mod encounter;
pub mod generate;
pub mod messenger;
pub mod persist;
pub mod session;
pub mod story;
pub mod testing;
pub mod village;

// Primary public API
pub use character::{Ability, AbilityScores, Character, CharacterClass, PlayerId};
pub use combat::{compute_damage, CombatStats, MonsterInstance, MonsterTemplate};
pub use encounter::{Encounter, EncounterGenerator};
pub use generate::{ContentGenerator, GenerateError, Generated, Generator};
pub use messenger::{chunk_text, Messenger, MessengerError, MAX_MESSAGE_LEN};
pub use persist::{PersistError, PlayerRecord, PlayerStore};
pub use session::{EndSignal, SessionConfig, SessionDispatcher, SessionToken};
pub use story::{Adventure, AdventureOutcome, EndPolicy, StoryError, TargetChoice};
pub use village::{ShopItem, TransactionOutcome, Village};
