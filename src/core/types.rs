//! Shared types used across Palaver modules
//!
//! Contains utterances, turn records, and the events published to observers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A labeled line in an agent's conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    /// Label of the speaker (an agent's role for prompts, its name for replies)
    pub role: String,
    /// Text of the utterance
    pub text: String,
}

impl Utterance {
    /// Create a new utterance
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }

    /// Render as the single line replayed to the backend
    pub fn format_line(&self) -> String {
        format!("[{}] {}", self.role, self.text)
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One agent invocation as published to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// 1-based invocation index within the conversation
    pub turn: usize,
    /// Agent name
    pub agent: String,
    /// Agent display role
    pub role: String,
    /// Generated text
    pub text: String,
    /// Token counters, when the backend reports them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Identifier tagging every event of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Use a caller-chosen identifier (a user id, a chunk label, ...)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier
    pub fn random() -> Self {
        Self(format!("session-{:08x}", rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Something that happened inside a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// The driver began running the roster
    Started { agents: Vec<String> },
    /// An agent produced a reply
    Turn(TurnRecord),
    /// An agent's backend call failed
    TurnFailed {
        turn: usize,
        agent: String,
        message: String,
    },
    /// Terminal: the final marker was found
    Recommendation { text: String },
    /// Terminal: the turn cap was exhausted without the marker
    NoRecommendation,
    /// Terminal: the caller cancelled the run
    Cancelled,
    /// Terminal: the run stopped on an error
    Aborted { message: String },
}

impl ConversationEvent {
    /// Whether this event ends the conversation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Recommendation { .. }
                | Self::NoRecommendation
                | Self::Cancelled
                | Self::Aborted { .. }
        )
    }
}

/// A conversation event tagged with its session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session: SessionId,
    #[serde(flatten)]
    pub event: ConversationEvent,
}

impl SessionEvent {
    pub fn new(session: SessionId, event: ConversationEvent) -> Self {
        Self { session, event }
    }
}
