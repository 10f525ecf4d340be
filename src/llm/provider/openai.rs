//! OpenAI-compatible Provider
//!
//! Works against any `/chat/completions` endpoint that speaks the OpenAI
//! wire format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PalaverError, Result, TokenUsage};
use crate::llm::provider::send_json;
use crate::llm::traits::{Backend, Completion};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl OpenAiBackend {
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

    fn into_completion(response: ChatResponse) -> Result<Completion> {
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PalaverError::malformed("chat completion has no message content"))?;

        Ok(Completion {
            text,
            usage: response
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
        })
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(&self, model: &str, payload: &str) -> Result<Completion> {
        debug!(model, bytes = payload.len(), "openai chat completion");

        let request = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: payload,
            }],
        };

        let response: ChatResponse = send_json(
            self.name(),
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request),
        )
        .await?;

        Self::into_completion(response)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
