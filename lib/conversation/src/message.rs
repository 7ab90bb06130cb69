//! Conversation turns and the bounded history window.
//!
//! A run never sees the full conversation history. It sees a bounded
//! window of the most recent turns, newest last, so prompt size stays
//! predictable regardless of conversation age.

use chrono::{DateTime, Utc};
use flowgate_core::MessageId;
use serde::{Deserialize, Serialize};

/// Default number of turns retained in a window.
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// A message from the end user.
    User,
    /// A message produced by the agent.
    Agent,
    /// An injected system note (e.g. an action outcome surfaced to the user).
    System,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique identifier for this message.
    pub id: MessageId,
    /// Who authored the turn.
    pub role: TurnRole,
    /// The message content.
    pub content: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Creates an agent turn.
    #[must_use]
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Agent, content)
    }

    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A bounded window over recent conversation turns.
///
/// Pushing beyond capacity evicts the oldest turn. Turns are ordered
/// oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationWindow {
    turns: Vec<Turn>,
    capacity: usize,
}

impl ConversationWindow {
    /// Creates an empty window with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_SIZE)
    }

    /// Creates an empty window with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            turns: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Creates a window from existing turns, keeping only the newest
    /// `capacity` of them.
    #[must_use]
    pub fn from_turns(turns: Vec<Turn>, capacity: usize) -> Self {
        let mut window = Self::with_capacity(capacity);
        for turn in turns {
            window.push(turn);
        }
        window
    }

    /// Appends a turn, evicting the oldest if the window is full.
    pub fn push(&mut self, turn: Turn) {
        if self.turns.len() == self.capacity {
            self.turns.remove(0);
        }
        self.turns.push(turn);
    }

    /// Returns the turns, oldest first.
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the most recent turn, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Returns the number of turns currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if the window holds no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the window's capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_evicts_oldest() {
        let mut window = ConversationWindow::with_capacity(2);
        window.push(Turn::user("first"));
        window.push(Turn::agent("second"));
        window.push(Turn::user("third"));

        assert_eq!(window.len(), 2);
        assert_eq!(window.turns()[0].content, "second");
        assert_eq!(window.latest().unwrap().content, "third");
    }

    #[test]
    fn from_turns_keeps_newest() {
        let turns = vec![Turn::user("a"), Turn::agent("b"), Turn::user("c")];
        let window = ConversationWindow::from_turns(turns, 2);

        assert_eq!(window.len(), 2);
        assert_eq!(window.turns()[0].content, "b");
    }

    #[test]
    fn capacity_is_at_least_one() {
        let mut window = ConversationWindow::with_capacity(0);
        window.push(Turn::user("only"));
        assert_eq!(window.len(), 1);
        assert_eq!(window.capacity(), 1);
    }

    #[test]
    fn turn_serde_roundtrip() {
        let turn = Turn::agent("hello");
        let json = serde_json::to_string(&turn).expect("serialize");
        let parsed: Turn = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(turn, parsed);
    }
}
