//! The messaging seam.
//!
//! The engine needs exactly three things from a chat platform: send text,
//! reply to the initiating participant, and wait for their next message
//! within a timeout. A timeout is not an error; every suspension point in
//! the adventure has its own fallback action, so `await_reply` reports it
//! as `Ok(None)`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Message size limit of the chat platform.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Errors from the messaging collaborator.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("conversation closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow interface to the chat platform.
#[async_trait]
pub trait Messenger: Send {
    /// Send text to the current conversation.
    async fn send(&mut self, text: &str) -> Result<(), MessengerError>;

    /// Reply to the initiating participant.
    async fn reply(&mut self, text: &str) -> Result<(), MessengerError>;

    /// Wait for the participant's next message.
    ///
    /// Returns `Ok(None)` when the timeout elapses.
    async fn await_reply(&mut self, timeout: Duration)
        -> Result<Option<String>, MessengerError>;

    /// Send long text as ordered chunks within the platform limit.
    async fn send_chunked(&mut self, text: &str) -> Result<(), MessengerError> {
        for chunk in chunk_text(text, MAX_MESSAGE_LEN) {
            self.send(&chunk).await?;
        }
        Ok(())
    }
}

/// Split text into chunks of at most `limit` characters.
///
/// Splits fall on sentence boundaries where possible; a single run longer
/// than the limit is split mid-sentence. Concatenating the chunks in order
/// reproduces the input.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    assert!(limit > 0, "chunk limit must be positive");

    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in text.split_inclusive(|c: char| matches!(c, '.' | '!' | '?' | '\n')) {
        let piece_len = piece.chars().count();

        if piece_len > limit {
            // A sentence longer than the limit: flush and hard-split it.
            if current_len > 0 {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let mut run = String::new();
            let mut run_len = 0usize;
            for ch in piece.chars() {
                run.push(ch);
                run_len += 1;
                if run_len == limit {
                    chunks.push(std::mem::take(&mut run));
                    run_len = 0;
                }
            }
            current = run;
            current_len = run_len;
            continue;
        }

        if current_len + piece_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push_str(piece);
        current_len += piece_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("Hello there.", 2000);
        assert_eq!(chunks, vec!["Hello there."]);
    }

    #[test]
    fn test_splits_on_sentence_boundaries() {
        let text = "First sentence. Second sentence! Third sentence?";
        let chunks = chunk_text(text, 20);
        assert!(chunks.len() >= 3);
        assert!(chunks[0].starts_with("First sentence."));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20);
        }
    }

    #[test]
    fn test_chunks_concatenate_to_original() {
        let text = "One. Two. Three! Four? Five.\nSix is a somewhat longer sentence here.";
        let chunks = chunk_text(text, 15);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_splits_oversized_sentence() {
        let text = "a".repeat(45);
        let chunks = chunk_text(&text, 20);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 20);
        assert_eq!(chunks[1].len(), 20);
        assert_eq!(chunks[2].len(), 5);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_exact_limit_is_not_split() {
        let text = "x".repeat(2000);
        assert_eq!(chunk_text(&text, 2000).len(), 1);
    }
}
