//! LLM module - completion backends
//!
//! Provides the backend abstraction, the concrete providers and the
//! [`ModelClient`] adapter agents call.

pub mod client;
pub mod provider;
pub mod traits;

pub use client::{Generation, ModelClient};
pub use provider::{create_backend, ProviderKind};
pub use traits::{Backend, Completion};
