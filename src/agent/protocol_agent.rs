//! A named participant in a round-robin conversation
//!
//! Each agent owns its own [`ContextManager`] and borrows a shared
//! [`ModelClient`].

use std::sync::Arc;

use tracing::debug;

use crate::agent::context::ContextManager;
use crate::core::Result;
use crate::llm::{Generation, ModelClient};

pub struct ProtocolAgent {
    name: String,
    role: String,
    client: Arc<ModelClient>,
    context: ContextManager,
    awaiting_reply: bool,
}

impl ProtocolAgent {
    pub fn new(name: impl Into<String>, role: impl Into<String>, client: Arc<ModelClient>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            client,
            context: ContextManager::new(),
            awaiting_reply: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn client(&self) -> &Arc<ModelClient> {
        &self.client
    }

    /// Respond to `input`
    ///
    /// The prompt is recorded under this agent's role before the backend is
    /// called, and the reply under its name afterwards. If generation fails
    /// the prompt stays in the context without a reply.
    pub async fn act(&mut self, input: &str) -> Result<Generation> {
        self.context.append(&self.role, input);
        self.awaiting_reply = true;
        let lines = self.context.snapshot();

        debug!(agent = %self.name, history = lines.len(), "acting");
        let generation = self.client.generate(&lines).await?;

        self.context.append(&self.name, &generation.text);
        self.awaiting_reply = false;
        Ok(generation)
    }

    /// Whether the last recorded entry is a prompt with no reply
    pub fn has_unanswered_prompt(&self) -> bool {
        self.awaiting_reply
    }
}

impl std::fmt::Debug for ProtocolAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolAgent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("history", &self.context.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PalaverError;
    use crate::llm::{Backend, Completion};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with the number of lines it was shown, or fails when told to
    struct CountingBackend {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Backend for CountingBackend {
        async fn complete(&self, _model: &str, payload: &str) -> Result<Completion> {
            self.seen.lock().unwrap().push(payload.to_string());
            if self.fail {
                return Err(PalaverError::upstream("503 Service Unavailable"));
            }
            Ok(Completion::text(format!(
                "saw {} lines",
                payload.lines().count()
            )))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn agent(fail: bool) -> (ProtocolAgent, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend {
            fail,
            seen: Mutex::new(Vec::new()),
        });
        let client = Arc::new(ModelClient::new(backend.clone(), "m"));
        (ProtocolAgent::new("coach", "Coach", client), backend)
    }

    #[tokio::test]
    async fn test_act_appends_prompt_and_reply() {
        let (mut agent, backend) = agent(false);

        let first = agent.act("plan my week").await.unwrap();
        assert_eq!(first.text, "saw 1 lines");
        let second = agent.act("plan my week").await.unwrap();
        assert_eq!(second.text, "saw 3 lines");

        assert_eq!(agent.context().len(), 4);
        assert_eq!(
            agent.context().snapshot(),
            vec![
                "[Coach] plan my week",
                "[coach] saw 1 lines",
                "[Coach] plan my week",
                "[coach] saw 3 lines",
            ]
        );
        assert_eq!(
            backend.seen.lock().unwrap()[1],
            "[Coach] plan my week\n[coach] saw 1 lines\n[Coach] plan my week"
        );
        assert!(!agent.has_unanswered_prompt());
    }

    #[tokio::test]
    async fn test_failed_act_leaves_dangling_prompt() {
        let (mut agent, _backend) = agent(true);

        let err = agent.act("hello").await.unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(agent.context().len(), 1);
        assert!(agent.has_unanswered_prompt());
    }

    #[tokio::test]
    async fn test_dangling_prompt_when_name_equals_role() {
        let backend = Arc::new(CountingBackend {
            fail: true,
            seen: Mutex::new(Vec::new()),
        });
        let client = Arc::new(ModelClient::new(backend, "m"));
        let mut agent = ProtocolAgent::new("coach", "coach", client);

        assert!(!agent.has_unanswered_prompt());
        assert!(agent.act("hello").await.is_err());
        assert!(agent.has_unanswered_prompt());
    }

    #[tokio::test]
    async fn test_agents_sharing_a_client_keep_separate_contexts() {
        let backend = Arc::new(CountingBackend {
            fail: false,
            seen: Mutex::new(Vec::new()),
        });
        let client = Arc::new(ModelClient::new(backend, "m"));
        let mut a = ProtocolAgent::new("a", "A", client.clone());
        let mut b = ProtocolAgent::new("b", "B", client);

        a.act("t").await.unwrap();
        a.act("t").await.unwrap();
        b.act("t").await.unwrap();

        assert_eq!(a.context().len(), 4);
        assert_eq!(b.context().len(), 2);
        assert_eq!(b.context().snapshot()[0], "[B] t");
    }
}
