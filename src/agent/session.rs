//! Independent conversations
//!
//! Each job gets a fresh set of agents, so nothing mutable is shared between
//! conversations except the (stateless) clients and the observer.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::driver::{ConversationReport, DriverSettings, RoundRobinDriver};
use crate::agent::observer::Observer;
use crate::agent::roster::Roster;
use crate::core::{ConversationEvent, Result, SessionEvent, SessionId};

/// One conversation to run
#[derive(Debug, Clone)]
pub struct ConversationJob {
    pub session: SessionId,
    pub task: String,
}

impl ConversationJob {
    pub fn new(session: SessionId, task: impl Into<String>) -> Self {
        Self {
            session,
            task: task.into(),
        }
    }
}

/// Run a single conversation with fresh agents from `roster`
pub async fn run_conversation(
    roster: &Roster,
    settings: &DriverSettings,
    job: ConversationJob,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> Result<ConversationReport> {
    let session = job.session.clone();
    let created = RoundRobinDriver::new(job.session, job.task, roster.agents(), settings.clone());
    let mut driver = match created {
        Ok(driver) => driver,
        Err(err) => {
            observer.publish(SessionEvent::new(
                session,
                ConversationEvent::Aborted {
                    message: err.to_string(),
                },
            ));
            return Err(err);
        }
    };

    driver.run(observer, cancel).await
}

/// Run independent conversations concurrently
///
/// Results line up with `jobs`. A failing conversation only fills its own
/// slot with an error; its siblings run to completion.
pub async fn run_sessions(
    roster: &Roster,
    settings: &DriverSettings,
    jobs: Vec<ConversationJob>,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> Vec<Result<ConversationReport>> {
    info!(sessions = jobs.len(), "running conversations");

    let runs = jobs.into_iter().map(|job| async move {
        let session = job.session.clone();
        let result = run_conversation(roster, settings, job, observer, cancel).await;
        if let Err(ref err) = result {
            warn!(session = %session, "conversation failed: {}", err);
        }
        result
    });

    join_all(runs).await
}
