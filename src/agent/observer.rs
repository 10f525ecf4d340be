//! Observers receive every event a conversation publishes
//!
//! One observer may serve many concurrent conversations, so every event is
//! tagged with its [`SessionId`] and delivery order across sessions is not
//! guaranteed.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::core::{ConversationEvent, SessionEvent, SessionId};

/// Sink for conversation events
pub trait Observer: Send + Sync {
    fn publish(&self, event: SessionEvent);
}

/// Forwards events over an unbounded channel
///
/// Events published after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Same as [`ChannelObserver::new`] with the receiver wrapped as a stream
    pub fn stream() -> (Self, UnboundedReceiverStream<SessionEvent>) {
        let (observer, rx) = Self::new();
        (observer, UnboundedReceiverStream::new(rx))
    }
}

impl Observer for ChannelObserver {
    fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn publish(&self, event: SessionEvent) {
        let session = event.session.as_str();
        match event.event {
            ConversationEvent::Started { agents } => {
                info!(session, agents = ?agents, "conversation started")
            }
            ConversationEvent::Turn(record) => info!(
                session,
                turn = record.turn,
                agent = %record.agent,
                chars = record.text.chars().count(),
                "turn"
            ),
            ConversationEvent::TurnFailed {
                turn,
                agent,
                message,
            } => warn!(session, turn, agent = %agent, "turn failed: {}", message),
            ConversationEvent::Recommendation { text } => {
                info!(session, "final recommendation: {}", text)
            }
            ConversationEvent::NoRecommendation => info!(session, "no recommendation reached"),
            ConversationEvent::Cancelled => info!(session, "conversation cancelled"),
            ConversationEvent::Aborted { message } => {
                warn!(session, "conversation aborted: {}", message)
            }
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far
    pub fn events(&self) -> Vec<SessionEvent> {
        self.lock().clone()
    }

    /// Events of one session, in publish order
    pub fn session(&self, session: &SessionId) -> Vec<ConversationEvent> {
        self.lock()
            .iter()
            .filter(|e| &e.session == session)
            .map(|e| e.event.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SessionEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Observer for CollectingObserver {
    fn publish(&self, event: SessionEvent) {
        self.lock().push(event);
    }
}

/// Publishes every event to each inner observer in order
pub struct Fanout {
    observers: Vec<Box<dyn Observer>>,
}

impl Fanout {
    pub fn new(observers: Vec<Box<dyn Observer>>) -> Self {
        Self { observers }
    }
}

impl Observer for Fanout {
    fn publish(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer.publish(event.clone());
        }
    }
}
