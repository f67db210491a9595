//! Testing utilities.
//!
//! This module provides deterministic stand-ins for the two external
//! collaborators so adventures can run without a chat platform or API key:
//! - `MockMessenger` replays scripted player replies and captures output
//! - `ScriptedGenerator` serves queued content and fails when exhausted

use crate::character::Character;
use crate::combat::MonsterTemplate;
use crate::generate::{Generated, GenerateError, GeneratedShopItem, Generator};
use crate::messenger::{Messenger, MessengerError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

/// A messenger that replays scripted replies and records everything sent.
///
/// An exhausted reply queue behaves as a timeout, which exercises every
/// suspension point's fallback path. For whole-adventure runs, a default
/// cycle can keep answering after the queue drains so loops that re-prompt
/// on timeout still make progress.
#[derive(Debug, Default)]
pub struct MockMessenger {
    replies: VecDeque<Option<String>>,
    default_cycle: Vec<Option<String>>,
    cycle_index: usize,
    /// Everything the adventure sent, in order.
    pub sent: Vec<String>,
}

impl MockMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a player reply.
    pub fn queue_reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.replies.push_back(Some(text.into()));
        self
    }

    /// Queue a timed-out suspension point.
    pub fn queue_timeout(&mut self) -> &mut Self {
        self.replies.push_back(None);
        self
    }

    /// Answers served in rotation once the reply queue is exhausted.
    ///
    /// `None` entries are timeouts. A cycle of `[None, Some("3")]`
    /// alternates timing out with choosing "leave", which drives any
    /// adventure to completion.
    pub fn with_default_cycle(mut self, cycle: Vec<Option<String>>) -> Self {
        self.default_cycle = cycle;
        self
    }

    /// All captured output joined for substring assertions.
    pub fn transcript(&self) -> String {
        self.sent.join("\n")
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    async fn send(&mut self, text: &str) -> Result<(), MessengerError> {
        self.sent.push(text.to_string());
        Ok(())
    }

    async fn reply(&mut self, text: &str) -> Result<(), MessengerError> {
        self.sent.push(text.to_string());
        Ok(())
    }

    async fn await_reply(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<String>, MessengerError> {
        if let Some(reply) = self.replies.pop_front() {
            return Ok(reply);
        }
        if self.default_cycle.is_empty() {
            return Ok(None);
        }
        let reply = self.default_cycle[self.cycle_index % self.default_cycle.len()].clone();
        self.cycle_index += 1;
        Ok(reply)
    }
}

/// A generator that serves queued content.
///
/// Every queue drains independently; an exhausted queue produces a
/// transport-level error, the same shape a dead API connection would.
/// Narrative, theme, and ending requests share the `narratives` queue.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    templates: VecDeque<MonsterTemplate>,
    scores: VecDeque<u32>,
    characters: VecDeque<Character>,
    narratives: VecDeque<String>,
    catalogs: VecDeque<Vec<GeneratedShopItem>>,
    /// Names of the generator methods invoked, in order.
    pub calls: Vec<&'static str>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_template(&mut self, template: MonsterTemplate) -> &mut Self {
        self.templates.push_back(template);
        self
    }

    pub fn queue_score(&mut self, score: u32) -> &mut Self {
        self.scores.push_back(score);
        self
    }

    pub fn queue_character(&mut self, character: Character) -> &mut Self {
        self.characters.push_back(character);
        self
    }

    pub fn queue_narrative(&mut self, text: impl Into<String>) -> &mut Self {
        self.narratives.push_back(text.into());
        self
    }

    pub fn queue_catalog(&mut self, items: Vec<GeneratedShopItem>) -> &mut Self {
        self.catalogs.push_back(items);
        self
    }
}

fn exhausted() -> GenerateError {
    GenerateError::Api(mistral::Error::Network(
        "no scripted response".to_string(),
    ))
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn monster_template(
        &mut self,
        _existing: &[MonsterTemplate],
        _story_context: &str,
    ) -> Result<Generated<MonsterTemplate>, GenerateError> {
        self.calls.push("monster_template");
        self.templates
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn attack_score(
        &mut self,
        _description: &str,
    ) -> Result<Generated<u32>, GenerateError> {
        self.calls.push("attack_score");
        self.scores
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn character(
        &mut self,
        _story_context: &str,
        _preference: &str,
    ) -> Result<Generated<Character>, GenerateError> {
        self.calls.push("character");
        self.characters
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn narrative(
        &mut self,
        _story_context: &str,
        _encounter_context: &str,
    ) -> Result<Generated<String>, GenerateError> {
        self.calls.push("narrative");
        self.narratives
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn theme_header(
        &mut self,
        _story_context: &str,
    ) -> Result<Generated<String>, GenerateError> {
        self.calls.push("theme_header");
        self.narratives
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn ending(
        &mut self,
        _story_context: &str,
    ) -> Result<Generated<String>, GenerateError> {
        self.calls.push("ending");
        self.narratives
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }

    async fn shop_catalog(
        &mut self,
        _story_context: &str,
    ) -> Result<Generated<Vec<GeneratedShopItem>>, GenerateError> {
        self.calls.push("shop_catalog");
        self.catalogs
            .pop_front()
            .map(Generated::Fresh)
            .ok_or_else(exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_messenger_replays_and_captures() {
        let mut messenger = MockMessenger::new();
        messenger.queue_reply("attack").queue_timeout();

        messenger.send("roster").await.unwrap();
        assert_eq!(
            messenger
                .await_reply(Duration::from_secs(1))
                .await
                .unwrap(),
            Some("attack".to_string())
        );
        assert_eq!(
            messenger
                .await_reply(Duration::from_secs(1))
                .await
                .unwrap(),
            None
        );
        // Exhausted queue keeps timing out.
        assert_eq!(
            messenger
                .await_reply(Duration::from_secs(1))
                .await
                .unwrap(),
            None
        );
        assert!(messenger.transcript().contains("roster"));
    }

    #[tokio::test]
    async fn test_scripted_generator_drains_then_fails() {
        let mut generator = ScriptedGenerator::new();
        generator.queue_score(7);

        let first = generator.attack_score("a swing").await.unwrap();
        assert_eq!(first.into_inner(), 7);

        assert!(generator.attack_score("a swing").await.is_err());
        assert_eq!(generator.calls, vec!["attack_score", "attack_score"]);
    }
}
