//! Configuration management for Palaver
//!
//! Supports a config file, a `.env` file and environment variables, all
//! resolved once into an explicit [`Config`] that is passed to whatever
//! needs it. Nothing reads the environment after loading.
//!
//! Config file location: ~/.config/palaver/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{PalaverError, Result};
use crate::llm::ProviderKind;

/// Main configuration for Palaver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Whether to show debug output
    #[serde(default)]
    pub debug: bool,
    /// Default completion backend
    pub backend: BackendConfig,
    /// Conversation driver settings
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Chunked batch analysis settings
    #[serde(default)]
    pub batch: BatchConfig,
    /// Ordered roster of agents
    #[serde(default = "default_agents")]
    pub agents: Vec<AgentSpec>,
}

/// Completion backend configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Provider tag: gemini, openai or hf
    pub provider: String,
    /// Model identifier passed to the provider
    pub model: String,
    /// API key (falls back to the provider's environment variable on load)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Override for the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How the turn cap is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPolicy {
    /// `max_turns` bounds individual agent invocations
    #[default]
    PerCall,
    /// `max_turns` bounds full passes over the roster
    PerRound,
}

/// What the driver does when a backend call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the conversation and return the error
    #[default]
    Abort,
    /// Publish the failure and move on to the next agent
    Continue,
}

/// Conversation driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Turn cap, interpreted according to `turn_policy`
    /// Default: 6
    pub max_turns: usize,
    /// Default: per_call
    pub turn_policy: TurnPolicy,
    /// Sentinel that ends the conversation; text after it is the result
    pub final_marker: String,
    /// Default: abort
    pub on_error: ErrorPolicy,
    /// Maximum characters of a reply shown on the console
    /// Default: 1500
    pub display_limit: usize,
}

/// Chunked batch analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records per chunk
    /// Default: 100
    pub chunk_size: usize,
    /// Run a follow-up conversation over each chunk's analysis
    /// Default: true
    pub followup: bool,
    /// Backend shared by the follow-up roster; the default backend when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_backend: Option<BackendConfig>,
}

/// One roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent name, used to label its own replies
    pub name: String,
    /// Display role, used to label the prompts it receives
    pub role: String,
    /// Dedicated backend; agents without one share the default client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendConfig>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            backend: None,
        }
    }
}

/// Marker the diary prompts ask the model to emit
pub const DEFAULT_FINAL_MARKER: &str = "最終建議：";

fn default_timeout_secs() -> u64 {
    120
}

fn default_agents() -> Vec<AgentSpec> {
    vec![
        AgentSpec::new("analysis_expert", "分析專家"),
        AgentSpec::new("ai_coach", "AI 教練"),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            backend: BackendConfig::default(),
            conversation: ConversationConfig::default(),
            batch: BatchConfig::default(),
            agents: default_agents(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash-8b".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: 6,
            turn_policy: TurnPolicy::PerCall,
            final_marker: DEFAULT_FINAL_MARKER.to_string(),
            on_error: ErrorPolicy::Abort,
            display_limit: 1500,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            followup: true,
            followup_backend: None,
        }
    }
}

impl BackendConfig {
    /// Environment variable holding the key for this provider
    pub fn api_key_env(&self) -> Option<&'static str> {
        self.provider
            .parse::<ProviderKind>()
            .ok()
            .map(ProviderKind::api_key_env)
    }

    /// Fill a missing API key from the provider's environment variable
    pub fn fill_api_key_from_env(&mut self) {
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            if let Some(var) = self.api_key_env() {
                self.api_key = env::var(var).ok().filter(|k| !k.is_empty());
            }
        }
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(PalaverError::config(format!("{}: model is empty", label)));
        }
        if let Some(ref base) = self.base_url {
            url::Url::parse(base).map_err(|e| {
                PalaverError::config(format!("{}: invalid base_url '{}': {}", label, base, e))
            })?;
        }
        if self.timeout_secs == 0 {
            return Err(PalaverError::config(format!(
                "{}: timeout_secs must be positive",
                label
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("palaver")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = if Self::config_exists() {
            Self::load_from_file()?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();
        let content = fs::read_to_string(&config_path)
            .map_err(|e| PalaverError::config(format!("Failed to read config: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay environment variables onto the loaded values
    pub fn apply_env(&mut self) {
        if let Ok(provider) = env::var("PALAVER_PROVIDER") {
            self.backend.provider = provider;
        }
        if let Ok(model) = env::var("PALAVER_MODEL") {
            self.backend.model = model;
        }
        if let Ok(debug) = env::var("PALAVER_DEBUG") {
            self.debug = debug == "true" || debug == "1";
        }

        self.backend.fill_api_key_from_env();
        if let Some(ref mut backend) = self.batch.followup_backend {
            backend.fill_api_key_from_env();
        }
        for agent in &mut self.agents {
            if let Some(ref mut backend) = agent.backend {
                backend.fill_api_key_from_env();
            }
        }
    }

    /// Check the configuration once before anything is built from it
    pub fn validate(&self) -> Result<()> {
        self.backend.validate("backend")?;

        if self.conversation.max_turns == 0 {
            return Err(PalaverError::config("max_turns must be at least 1"));
        }
        if self.conversation.final_marker.is_empty() {
            return Err(PalaverError::config("final_marker must not be empty"));
        }
        if self.batch.chunk_size == 0 {
            return Err(PalaverError::config("batch.chunk_size must be at least 1"));
        }
        if let Some(ref backend) = self.batch.followup_backend {
            backend.validate("batch.followup_backend")?;
        }
        if self.agents.is_empty() {
            return Err(PalaverError::config("at least one agent is required"));
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(PalaverError::config("agent name must not be empty"));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(PalaverError::config(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            if let Some(ref backend) = agent.backend {
                backend.validate(&format!("agents.{}.backend", agent.name))?;
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| PalaverError::config(format!("Failed to create config dir: {}", e)))?;
        }

        // Keys come from the environment; never write them to disk
        let mut to_write = self.clone();
        to_write.backend.api_key = None;
        if let Some(ref mut backend) = to_write.batch.followup_backend {
            backend.api_key = None;
        }
        for agent in &mut to_write.agents {
            if let Some(ref mut backend) = agent.backend {
                backend.api_key = None;
            }
        }

        let content = toml::to_string_pretty(&to_write)
            .map_err(|e| PalaverError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| PalaverError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Check if a config file exists
    pub fn config_exists() -> bool {
        Self::config_file().exists()
    }

    /// Display name for an agent, falling back to its name
    pub fn display_role<'a>(&'a self, agent: &'a str) -> &'a str {
        self.agents
            .iter()
            .find(|a| a.name == agent)
            .map(|a| a.role.as_str())
            .unwrap_or(agent)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
