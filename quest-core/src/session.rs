//! Session configuration and dispatch.
//!
//! Each adventure is one logical session owned by one user. The dispatcher
//! hands out per-session tokens and refuses a second session for a user
//! whose adventure is still running; the token carries the force-end signal
//! the adventure checks at the top of every loop iteration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one adventure session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Wait for village and targeting choices.
    pub choice_timeout: Duration,

    /// Wait for an attack description.
    pub attack_timeout: Duration,

    /// Wait for the initial character-preference prompt.
    pub preference_timeout: Duration,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            choice_timeout: Duration::from_secs(30),
            attack_timeout: Duration::from_secs(60),
            preference_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_choice_timeout(mut self, timeout: Duration) -> Self {
        self.choice_timeout = timeout;
        self
    }

    pub fn with_attack_timeout(mut self, timeout: Duration) -> Self {
        self.attack_timeout = timeout;
        self
    }

    pub fn with_preference_timeout(mut self, timeout: Duration) -> Self {
        self.preference_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared flag asking a running adventure to wrap up.
#[derive(Debug, Clone, Default)]
pub struct EndSignal(Arc<AtomicBool>);

impl EndSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Token for one active session.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub user_id: String,
    pub end_signal: EndSignal,
}

/// Tracks which users have a session running.
///
/// One session per user: `begin` refuses while a previous session for the
/// same user has not been `finish`ed.
#[derive(Debug, Default)]
pub struct SessionDispatcher {
    active: HashMap<String, EndSignal>,
}

impl SessionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for a user. Returns `None` if one is already live.
    pub fn begin(&mut self, user_id: impl Into<String>) -> Option<SessionToken> {
        let user_id = user_id.into();
        if self.active.contains_key(&user_id) {
            return None;
        }
        let end_signal = EndSignal::new();
        self.active.insert(user_id.clone(), end_signal.clone());
        Some(SessionToken {
            user_id,
            end_signal,
        })
    }

    /// Whether the user has a live session.
    pub fn is_active(&self, user_id: &str) -> bool {
        self.active.contains_key(user_id)
    }

    /// Ask the user's running session to end. Returns false if none.
    pub fn force_end(&self, user_id: &str) -> bool {
        match self.active.get(user_id) {
            Some(signal) => {
                signal.trigger();
                true
            }
            None => false,
        }
    }

    /// Release the user's session slot.
    pub fn finish(&mut self, user_id: &str) {
        self.active.remove(user_id);
    }
}
