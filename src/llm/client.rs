//! Model client
//!
//! Turns an ordered list of conversation lines into one completion request
//! against the backend chosen at construction.

use std::sync::Arc;

use tracing::debug;

use crate::core::{BackendConfig, PalaverError, Result, TokenUsage};
use crate::llm::provider::create_backend;
use crate::llm::traits::Backend;

/// Trimmed output of one `generate` call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Adapter from conversation lines to a single backend request
///
/// Stateless between calls; wrap it in an `Arc` to share it between agents.
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn Backend>,
    model: String,
}

impl ModelClient {
    /// Wrap an already-built backend
    pub fn new(backend: Arc<dyn Backend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Build the backend named by the configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Ok(Self::new(create_backend(config)?, config.model.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &str {
        self.backend.name()
    }

    /// Generate a reply conditioned on `lines`
    ///
    /// Lines are joined with `\n` into one payload. An empty slice fails with
    /// [`PalaverError::EmptyPrompt`] without touching the network.
    pub async fn generate<S: AsRef<str>>(&self, lines: &[S]) -> Result<Generation> {
        if lines.is_empty() {
            return Err(PalaverError::EmptyPrompt);
        }

        let payload = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            provider = self.provider(),
            model = %self.model,
            lines = lines.len(),
            "generate"
        );

        let completion = self.backend.complete(&self.model, &payload).await?;

        Ok(Generation {
            text: completion.text.trim().to_string(),
            usage: completion.usage,
        })
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider())
            .field("model", &self.model)
            .finish()
    }
}
