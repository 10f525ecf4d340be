//! Core module - shared infrastructure for Palaver
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AgentSpec, BackendConfig, BatchConfig, Config, ConversationConfig, ErrorPolicy, TurnPolicy,
};
pub use error::{PalaverError, Result};
pub use types::*;
