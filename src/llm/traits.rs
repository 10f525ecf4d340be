//! Backend trait for abstracting completion providers
//!
//! Enables swapping between Gemini, OpenAI-compatible and hosted-inference
//! endpoints behind one `complete` call.

use async_trait::async_trait;

use crate::core::{Result, TokenUsage};

/// Raw reply from a backend
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text, as returned by the provider
    pub text: String,
    /// Token usage information
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// A completion provider
///
/// Implementations hold no per-call state so one instance can serve many
/// agents and many concurrent conversations.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Send one payload and return the generated text
    async fn complete(&self, model: &str, payload: &str) -> Result<Completion>;

    /// Get the provider name
    fn name(&self) -> &str;
}
