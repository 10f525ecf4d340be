//! Roster construction
//!
//! Builds the agents named in the configuration. Agents without their own
//! backend share one client.

use std::sync::Arc;

use tracing::debug;

use crate::agent::protocol_agent::ProtocolAgent;
use crate::core::{AgentSpec, Config, Result};
use crate::llm::ModelClient;

/// Agent specifications bound to ready clients
#[derive(Debug, Clone)]
pub struct Roster {
    entries: Vec<(AgentSpec, Arc<ModelClient>)>,
}

impl Roster {
    /// Resolve every roster entry against the configured backends
    pub fn build(config: &Config) -> Result<Self> {
        let shared = Arc::new(ModelClient::from_config(&config.backend)?);
        Self::with_default_client(&config.agents, shared)
    }

    /// Same agents, sharing the batch follow-up backend instead
    ///
    /// Falls back to the default backend when no follow-up backend is set.
    pub fn build_followup(config: &Config) -> Result<Self> {
        let backend = config
            .batch
            .followup_backend
            .as_ref()
            .unwrap_or(&config.backend);
        let shared = Arc::new(ModelClient::from_config(backend)?);
        Self::with_default_client(&config.agents, shared)
    }

    /// Resolve entries using `shared` for agents without a backend override
    pub fn with_default_client(specs: &[AgentSpec], shared: Arc<ModelClient>) -> Result<Self> {
        let mut entries = Vec::with_capacity(specs.len());

        for spec in specs {
            let client = match spec.backend {
                Some(ref backend) => {
                    debug!(agent = %spec.name, provider = %backend.provider, "dedicated client");
                    Arc::new(ModelClient::from_config(backend)?)
                }
                None => shared.clone(),
            };
            entries.push((spec.clone(), client));
        }

        Ok(Self { entries })
    }

    /// Fresh agents with empty contexts, one per entry, in roster order
    pub fn agents(&self) -> Vec<ProtocolAgent> {
        self.entries
            .iter()
            .map(|(spec, client)| ProtocolAgent::new(&spec.name, &spec.role, client.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
