//! Palaver - round-robin multi-agent conversations
//!
//! Runs a fixed task prompt through a roster of LLM-backed agents in
//! rotation, publishing every turn to an observer and stopping as soon as a
//! reply carries the final marker.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Backend trait, Gemini / OpenAI-compatible / Hugging Face
//!   providers, and the `ModelClient` adapter
//! - **Agent**: Per-agent context, the round-robin driver, observers and
//!   concurrent sessions
//! - **Analysis**: Diary and batch task prompts, JSON scoring
//! - **CLI**: Subcommands and console rendering
//!
//! # Usage
//!
//! ```rust,no_run
//! use palaver::agent::{
//!     run_conversation, ConversationJob, DriverSettings, Roster, TracingObserver,
//! };
//! use palaver::{Config, SessionId};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> palaver::Result<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     let roster = Roster::build(&config)?;
//!     let settings = DriverSettings::from(&config.conversation);
//!     let task = "Plan a calmer week. End with 最終建議：";
//!     let job = ConversationJob::new(SessionId::random(), task);
//!
//!     let cancel = CancellationToken::new();
//!     let report = run_conversation(&roster, &settings, job, &TracingObserver, &cancel).await?;
//!     println!("{:?}", report.recommendation());
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod analysis;
pub mod cli;
pub mod core;
pub mod llm;

// Re-export commonly used items
pub use agent::{Observer, ProtocolAgent, RoundRobinDriver};
pub use core::{Config, ErrorPolicy, PalaverError, Result, SessionId, TurnPolicy};
pub use llm::ModelClient;
