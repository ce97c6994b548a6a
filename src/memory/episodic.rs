//! Episodic Memory - conversation history of one session
//!
//! Keeps every turn for the session lifetime. Fact extraction reads the whole
//! user transcript; prompts only see a recent window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodicMemory {
    turns: Vec<ConversationTurn>,
    prompt_window: usize,
}

impl EpisodicMemory {
    pub fn new(prompt_window: usize) -> Self {
        Self {
            turns: Vec::new(),
            prompt_window,
        }
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add_turn(Role::User, content.into());
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add_turn(Role::Assistant, content.into());
    }

    fn add_turn(&mut self, role: Role, content: String) {
        self.turns.push(ConversationTurn {
            role,
            content,
            timestamp: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `n` turns, oldest first.
    pub fn last_turns(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Every user utterance so far, one per line.
    pub fn user_transcript(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Format recent history for prompt injection
    pub fn format_for_prompt(&self) -> String {
        format_turns(self.last_turns(self.prompt_window))
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

pub fn format_turns(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|turn| {
            let role_str = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", role_str, turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Default for EpisodicMemory {
    fn default() -> Self {
        Self::new(12)
    }
}
