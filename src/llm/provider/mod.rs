//! Backend implementations and factory
//!
//! Submodules implement specific providers (Gemini, OpenAI-compatible,
//! Hugging Face inference).

pub mod gemini;
pub mod huggingface;
pub mod openai;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::{BackendConfig, PalaverError, Result};
use crate::llm::traits::Backend;

use self::gemini::GeminiBackend;
use self::huggingface::HuggingFaceBackend;
use self::openai::OpenAiBackend;

/// The closed set of supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Google Gemini native API
    Gemini,
    /// Any OpenAI-compatible chat-completions endpoint
    OpenAi,
    /// Hugging Face hosted inference
    HuggingFace,
}

impl FromStr for ProviderKind {
    type Err = PalaverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "hf" | "huggingface" => Ok(Self::HuggingFace),
            _ => Err(PalaverError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl ProviderKind {
    /// Environment variable holding this provider's API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::HuggingFace => "HF_API_KEY",
        }
    }
}

/// Create a backend from configuration
///
/// The provider tag is checked here, once; the returned backend never
/// re-dispatches per call.
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    let kind: ProviderKind = config.provider.parse()?;
    let http = http_client(config.timeout_secs)?;
    let api_key = config.api_key.clone().unwrap_or_default();

    let backend: Arc<dyn Backend> = match kind {
        ProviderKind::Gemini => {
            Arc::new(GeminiBackend::new(http, api_key, config.base_url.clone()))
        }
        ProviderKind::OpenAi => {
            Arc::new(OpenAiBackend::new(http, api_key, config.base_url.clone()))
        }
        ProviderKind::HuggingFace => {
            Arc::new(HuggingFaceBackend::new(http, api_key, config.base_url.clone()))
        }
    };

    debug!(provider = backend.name(), model = %config.model, "backend created");
    Ok(backend)
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request and decode a JSON body, mapping every failure to an
/// upstream-class error
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            PalaverError::upstream(format!("{} request timed out", provider))
        } else if e.is_connect() {
            PalaverError::upstream(format!("Cannot connect to {}: {}", provider, e))
        } else {
            PalaverError::upstream(format!("{} request failed: {}", provider, e))
        }
    })?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PalaverError::upstream(format!("{} body read failed: {}", provider, e)))?;

    if !status.is_success() {
        return Err(PalaverError::upstream(format!(
            "{} API error ({}): {}",
            provider, status, body
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        PalaverError::malformed(format!("{} returned unexpected body: {}", provider, e))
    })
}
