//! Round-robin conversation driver
//!
//! Runs a fixed task prompt through a roster of agents in rotation until a
//! reply carries the final marker or the turn cap is used up. Turns are
//! strictly sequential: one agent acts at a time and turn N's snapshot is
//! taken before turn N+1's append.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::observer::Observer;
use crate::agent::protocol_agent::ProtocolAgent;
use crate::agent::termination::FinalMarker;
use crate::core::{
    ConversationConfig, ConversationEvent, ErrorPolicy, PalaverError, Result, SessionEvent,
    SessionId, TurnPolicy, TurnRecord,
};

/// Knobs for one conversation
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub max_turns: usize,
    pub turn_policy: TurnPolicy,
    pub final_marker: FinalMarker,
    pub on_error: ErrorPolicy,
}

impl DriverSettings {
    pub fn new(max_turns: usize, final_marker: impl Into<String>) -> Self {
        Self {
            max_turns,
            turn_policy: TurnPolicy::PerCall,
            final_marker: FinalMarker::new(final_marker),
            on_error: ErrorPolicy::Abort,
        }
    }

    pub fn with_turn_policy(mut self, policy: TurnPolicy) -> Self {
        self.turn_policy = policy;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }
}

impl From<&ConversationConfig> for DriverSettings {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            turn_policy: config.turn_policy,
            final_marker: FinalMarker::new(config.final_marker.clone()),
            on_error: config.on_error,
        }
    }
}

/// Lifecycle of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    Running,
    /// Stopped on the marker (`Some`) or by exhausting the cap (`None`)
    Completed { recommendation: Option<String> },
    Cancelled,
    /// Stopped on a backend error under [`ErrorPolicy::Abort`]
    Aborted,
}

impl ConversationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct ConversationReport {
    pub session: SessionId,
    pub state: ConversationState,
    /// Agent invocations attempted, including failed ones
    pub invocations: usize,
    /// Successful turns in publish order
    pub records: Vec<TurnRecord>,
}

impl ConversationReport {
    pub fn recommendation(&self) -> Option<&str> {
        match self.state {
            ConversationState::Completed {
                recommendation: Some(ref text),
            } => Some(text),
            _ => None,
        }
    }
}

/// Drives one conversation; runs once
pub struct RoundRobinDriver {
    session: SessionId,
    task: String,
    agents: Vec<ProtocolAgent>,
    settings: DriverSettings,
    state: ConversationState,
}

impl RoundRobinDriver {
    pub fn new(
        session: SessionId,
        task: impl Into<String>,
        agents: Vec<ProtocolAgent>,
        settings: DriverSettings,
    ) -> Result<Self> {
        if agents.is_empty() {
            return Err(PalaverError::config("a conversation needs at least one agent"));
        }
        if settings.max_turns == 0 {
            return Err(PalaverError::config("max_turns must be at least 1"));
        }

        Ok(Self {
            session,
            task: task.into(),
            agents,
            settings,
            state: ConversationState::Running,
        })
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn agents(&self) -> &[ProtocolAgent] {
        &self.agents
    }

    /// Upper bound on agent invocations for this roster
    pub fn invocation_cap(&self) -> usize {
        match self.settings.turn_policy {
            TurnPolicy::PerCall => self.settings.max_turns,
            TurnPolicy::PerRound => self.settings.max_turns.saturating_mul(self.agents.len()),
        }
    }

    /// Run the conversation to a terminal state
    ///
    /// Cancellation is not an error: the in-flight call is dropped, a
    /// `Cancelled` event is published and the partial report is returned.
    /// Under [`ErrorPolicy::Abort`] the first failed turn publishes
    /// `TurnFailed` and `Aborted`, then its error is returned.
    pub async fn run(
        &mut self,
        observer: &dyn Observer,
        cancel: &CancellationToken,
    ) -> Result<ConversationReport> {
        if self.state.is_terminal() {
            return Err(PalaverError::Other(format!(
                "conversation {} has already finished",
                self.session
            )));
        }

        let cap = self.invocation_cap();
        let mut records = Vec::new();
        let mut invocations = 0;
        let mut index = 0;

        info!(session = %self.session, agents = self.agents.len(), cap, "conversation starting");
        self.publish(
            observer,
            ConversationEvent::Started {
                agents: self.agents.iter().map(|a| a.name().to_string()).collect(),
            },
        );

        while invocations < cap {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(observer, invocations, records));
            }

            invocations += 1;
            let agent = &mut self.agents[index];
            let (name, role) = (agent.name().to_string(), agent.role().to_string());
            debug!(session = %self.session, turn = invocations, agent = %name, "turn");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = agent.act(&self.task) => Some(result),
            };

            match outcome {
                None => return Ok(self.cancelled(observer, invocations - 1, records)),
                Some(Ok(generation)) => {
                    let recommendation = self.settings.final_marker.extract(&generation.text);
                    let record = TurnRecord {
                        turn: invocations,
                        agent: name,
                        role,
                        text: generation.text,
                        usage: generation.usage,
                    };
                    records.push(record.clone());
                    self.publish(observer, ConversationEvent::Turn(record));

                    if let Some(text) = recommendation {
                        info!(session = %self.session, turn = invocations, "final marker found");
                        self.publish(
                            observer,
                            ConversationEvent::Recommendation { text: text.clone() },
                        );
                        self.state = ConversationState::Completed {
                            recommendation: Some(text),
                        };
                        return Ok(self.report(invocations, records));
                    }
                }
                Some(Err(err)) => {
                    warn!(
                        session = %self.session,
                        turn = invocations,
                        agent = %name,
                        "turn failed: {}",
                        err
                    );
                    self.publish(
                        observer,
                        ConversationEvent::TurnFailed {
                            turn: invocations,
                            agent: name,
                            message: err.to_string(),
                        },
                    );

                    if self.settings.on_error == ErrorPolicy::Abort {
                        self.publish(
                            observer,
                            ConversationEvent::Aborted {
                                message: err.to_string(),
                            },
                        );
                        self.state = ConversationState::Aborted;
                        return Err(err);
                    }
                }
            }

            index = (index + 1) % self.agents.len();
        }

        info!(session = %self.session, invocations, "turn cap reached without final marker");
        self.publish(observer, ConversationEvent::NoRecommendation);
        self.state = ConversationState::Completed {
            recommendation: None,
        };
        Ok(self.report(invocations, records))
    }

    fn cancelled(
        &mut self,
        observer: &dyn Observer,
        invocations: usize,
        records: Vec<TurnRecord>,
    ) -> ConversationReport {
        info!(session = %self.session, completed = records.len(), "conversation cancelled");
        self.publish(observer, ConversationEvent::Cancelled);
        self.state = ConversationState::Cancelled;
        self.report(invocations, records)
    }

    fn report(&self, invocations: usize, records: Vec<TurnRecord>) -> ConversationReport {
        ConversationReport {
            session: self.session.clone(),
            state: self.state.clone(),
            invocations,
            records,
        }
    }

    fn publish(&self, observer: &dyn Observer, event: ConversationEvent) {
        observer.publish(SessionEvent::new(self.session.clone(), event));
    }
}
