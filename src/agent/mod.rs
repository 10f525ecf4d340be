//! Agent module - round-robin conversations
//!
//! Contains per-agent context, the agents themselves, the driver that
//! rotates between them, and the observers that receive what they say.

pub mod context;
pub mod driver;
pub mod observer;
pub mod protocol_agent;
pub mod roster;
pub mod session;
pub mod termination;

pub use context::ContextManager;
pub use driver::{ConversationReport, ConversationState, DriverSettings, RoundRobinDriver};
pub use observer::{ChannelObserver, CollectingObserver, Fanout, Observer, TracingObserver};
pub use protocol_agent::ProtocolAgent;
pub use roster::Roster;
pub use session::{run_conversation, run_sessions, ConversationJob};
pub use termination::FinalMarker;
