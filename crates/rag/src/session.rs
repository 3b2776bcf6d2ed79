//! Conversation state for chat sessions.
//!
//! A session is an append-only ordered sequence of turns, bounded by a
//! retention cap with FIFO eviction. The store is session-keyed and passed
//! by reference into request handlers; there is no process-wide singleton.
//! Append is the only mutator, and the engine appends only after a turn's
//! generation succeeded, so a failed turn never changes what `recent`
//! returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Speaker role for a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Lowercase label used in prompts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Session-keyed conversation store.
pub struct SessionStore {
    max_turns: usize,
    sessions: RwLock<HashMap<String, VecDeque<Turn>>>,
}

impl SessionStore {
    /// Create a store retaining at most `max_turns` turns per session.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(2),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a turn to a session, evicting the oldest turn when the
    /// retention cap is exceeded.
    pub fn append(&self, session_id: &str, turn: Turn) {
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push_back(turn);

        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// The most recent `window` turns of a session, oldest first.
    ///
    /// Never mutates; an unknown session yields an empty sequence.
    pub fn recent(&self, session_id: &str, window: usize) -> Vec<Turn> {
        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match sessions.get(session_id) {
            Some(turns) => {
                let skip = turns.len().saturating_sub(window);
                turns.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Number of retained turns in a session.
    pub fn turn_count(&self, session_id: &str) -> usize {
        let sessions = match self.sessions.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.get(session_id).map(|t| t.len()).unwrap_or(0)
    }

    /// Drop all turns for a session.
    pub fn reset(&self, session_id: &str) {
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions.remove(session_id);
    }
}
