//! Hugging Face Inference Provider
//!
//! Generic hosted text-generation endpoint: `{"inputs": ...}` in,
//! `[{"generated_text": ...}]` out.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PalaverError, Result};
use crate::llm::provider::send_json;
use crate::llm::traits::{Backend, Completion};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

pub struct HuggingFaceBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

impl HuggingFaceBackend {
    pub fn new(client: Client, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.base_url, model)
    }

    fn into_completion(response: Vec<Generated>) -> Result<Completion> {
        response
            .into_iter()
            .next()
            .map(|g| Completion::text(g.generated_text))
            .ok_or_else(|| PalaverError::malformed("inference response is an empty list"))
    }
}

#[async_trait]
impl Backend for HuggingFaceBackend {
    async fn complete(&self, model: &str, payload: &str) -> Result<Completion> {
        debug!(model, bytes = payload.len(), "hf inference");

        let response: Vec<Generated> = send_json(
            self.name(),
            self.client
                .post(self.endpoint(model))
                .bearer_auth(&self.api_key)
                .json(&InferenceRequest { inputs: payload }),
        )
        .await?;

        Self::into_completion(response)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let backend = HuggingFaceBackend::new(Client::new(), String::new(), None);
        assert_eq!(
            backend.endpoint("gpt2"),
            "https://api-inference.huggingface.co/models/gpt2"
        );
    }

    #[test]
    fn test_parse_response() {
        let response: Vec<Generated> =
            serde_json::from_str(r#"[{"generated_text": "once upon a time"}]"#).unwrap();
        let completion = HuggingFaceBackend::into_completion(response).unwrap();
        assert_eq!(completion.text, "once upon a time");
        assert!(completion.usage.is_none());
    }

    #[test]
    fn test_empty_list_is_malformed() {
        assert!(matches!(
            HuggingFaceBackend::into_completion(Vec::new()),
            Err(PalaverError::MalformedResponse(_))
        ));
    }
}
