//! Google Gemini Provider
//!
//! Calls the native `generateContent` endpoint with the whole payload as a
//! single text part.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PalaverError, Result, TokenUsage};
use crate::llm::provider::send_json;
use crate::llm::traits::{Backend, Completion};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GeminiBackend {
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
        let model = model.trim_start_matches("models/");
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn into_completion(response: GenerateResponse) -> Result<Completion> {
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| PalaverError::malformed("Gemini response has no candidates"))?;

        let usage = response
            .usage_metadata
            .map(|u| TokenUsage::new(u.prompt_token_count, u.candidates_token_count));

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn complete(&self, model: &str, payload: &str) -> Result<Completion> {
        debug!(model, bytes = payload.len(), "gemini generateContent");

        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: payload }],
            }],
        };

        let response: GenerateResponse = send_json(
            self.name(),
            self.client
                .post(self.endpoint(model))
                .query(&[("key", self.api_key.as_str())])
                .json(&request),
        )
        .await?;

        Self::into_completion(response)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let backend = GeminiBackend::new(Client::new(), "k".into(), None);
        assert_eq!(
            backend.endpoint("models/gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: "a\nb" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "a\nb");
    }

    #[test]
    fn test_parse_response() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{
                "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "there"}]}}],
                "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7}
            }"#,
        )
        .unwrap();
        let completion = GeminiBackend::into_completion(response).unwrap();
        assert_eq!(completion.text, "Hello there");
        assert_eq!(completion.usage.unwrap().total_tokens, 7);
    }

    #[test]
    fn test_parse_empty_candidates() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            GeminiBackend::into_completion(response),
            Err(PalaverError::MalformedResponse(_))
        ));
    }
}
