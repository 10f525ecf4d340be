//! Shared helpers for integration tests
//!
//! A scripted backend that replays canned replies without any network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use palaver::core::{PalaverError, Result, TokenUsage};
use palaver::llm::{Backend, Completion};
use palaver::{ModelClient, ProtocolAgent};
use tokio_util::sync::CancellationToken;

/// One scripted backend call
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(String),
    /// Cancel the token, then never answer
    CancelAndHang(CancellationToken),
}

pub fn reply(text: &str) -> Step {
    Step::Reply(text.to_string())
}

/// Replays steps in order; repeats `fallback` once the script runs out
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    fallback: String,
    payloads: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Self::with_fallback(steps, "still thinking")
    }

    pub fn with_fallback(steps: Vec<Step>, fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            fallback: fallback.to_string(),
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(&self, _model: &str, payload: &str) -> Result<Completion> {
        self.payloads.lock().unwrap().push(payload.to_string());
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(Step::Reply(text)) => {
                Ok(Completion::text(text).with_usage(TokenUsage::new(10, 5)))
            }
            Some(Step::Fail(message)) => Err(PalaverError::upstream(message)),
            Some(Step::CancelAndHang(token)) => {
                token.cancel();
                std::future::pending::<Result<Completion>>().await
            }
            None => Ok(Completion::text(self.fallback.clone())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn client(backend: Arc<ScriptedBackend>) -> Arc<ModelClient> {
    Arc::new(ModelClient::new(backend, "scripted-model"))
}

pub fn agent(name: &str, backend: Arc<ScriptedBackend>) -> ProtocolAgent {
    ProtocolAgent::new(name, format!("{} role", name), client(backend))
}
