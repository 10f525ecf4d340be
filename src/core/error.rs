//! Custom error types for Palaver
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Palaver operations
#[derive(Error, Debug)]
pub enum PalaverError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend tag outside the supported set
    #[error("Unsupported provider '{0}'. Expected one of: gemini, openai, hf")]
    UnsupportedProvider(String),

    /// Transport or backend failure during generation
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Backend replied with content that could not be interpreted
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// `generate` was called with no conversation lines
    #[error("Cannot generate from an empty prompt")]
    EmptyPrompt,

    /// Work abandoned because the caller cancelled it
    #[error("Cancelled")]
    Cancelled,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Palaver operations
pub type Result<T> = std::result::Result<T, PalaverError>;

impl PalaverError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Whether this failure came from the backend side of a turn
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::Http(_) | Self::MalformedResponse(_)
        )
    }
}
