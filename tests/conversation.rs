//! Round-robin conversation tests
//!
//! Drives full conversations against scripted backends and checks the
//! published events, the final state and each agent's history.

mod common;

use common::{agent, reply, ScriptedBackend, Step};
use palaver::agent::{CollectingObserver, ConversationState, DriverSettings, RoundRobinDriver};
use palaver::core::{ConversationEvent, PalaverError, SessionId};
use palaver::{ErrorPolicy, TurnPolicy};
use tokio_util::sync::CancellationToken;

fn turns(events: &[ConversationEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ConversationEvent::Turn(_)))
        .count()
}

fn session() -> SessionId {
    SessionId::new("test")
}

#[tokio::test]
async fn test_stops_on_final_marker() {
    let a = ScriptedBackend::new(vec![reply("x")]);
    let b = ScriptedBackend::new(vec![reply("DONE: go home")]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", a.clone()), agent("B", b.clone())],
        DriverSettings::new(4, "DONE:"),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();

    assert_eq!(report.invocations, 2);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.recommendation(), Some("go home"));
    assert_eq!(a.calls() + b.calls(), 2);

    let events = observer.session(&session());
    assert_eq!(turns(&events), 2);
    assert_eq!(
        events.last(),
        Some(&ConversationEvent::Recommendation {
            text: "go home".to_string()
        })
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_no_marker_exhausts_cap() {
    let a = ScriptedBackend::with_fallback(vec![], "x");
    let b = ScriptedBackend::with_fallback(vec![], "y");
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", a.clone()), agent("B", b.clone())],
        DriverSettings::new(4, "DONE:"),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        report.state,
        ConversationState::Completed {
            recommendation: None
        }
    );
    assert_eq!(report.invocations, 4);
    assert_eq!((a.calls(), b.calls()), (2, 2));

    let events = observer.session(&session());
    assert_eq!(turns(&events), 4);
    assert_eq!(events.last(), Some(&ConversationEvent::NoRecommendation));
}

#[tokio::test]
async fn test_rotation_order_and_turn_numbers() {
    let backend = ScriptedBackend::new(vec![reply("1"), reply("2"), reply("3")]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![
            agent("A", backend.clone()),
            agent("B", backend.clone()),
            agent("C", backend.clone()),
        ],
        DriverSettings::new(3, "DONE:"),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();
    let order: Vec<(usize, &str, &str)> = report
        .records
        .iter()
        .map(|r| (r.turn, r.agent.as_str(), r.text.as_str()))
        .collect();
    assert_eq!(order, vec![(1, "A", "1"), (2, "B", "2"), (3, "C", "3")]);
    assert!(report.records.iter().all(|r| r.usage.is_some()));
}

#[tokio::test]
async fn test_per_round_policy() {
    let backend = ScriptedBackend::new(vec![]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", backend.clone()), agent("B", backend.clone())],
        DriverSettings::new(3, "DONE:").with_turn_policy(TurnPolicy::PerRound),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.invocations, 6);
    assert_eq!(backend.calls(), 6);
    assert_eq!(turns(&observer.session(&session())), 6);
}

#[tokio::test]
async fn test_contexts_grow_by_two_per_turn() {
    let backend = ScriptedBackend::new(vec![]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "the task",
        vec![agent("A", backend.clone()), agent("B", backend.clone())],
        DriverSettings::new(5, "DONE:"),
    )
    .unwrap();
    driver.run(&observer, &CancellationToken::new()).await.unwrap();

    // A acted on turns 1, 3, 5; B on turns 2, 4
    let agents = driver.agents();
    assert_eq!(agents[0].context().len(), 6);
    assert_eq!(agents[1].context().len(), 4);

    for agent in agents {
        let entries = agent.context().entries();
        for pair in entries.chunks(2) {
            assert_eq!(pair[0].role, agent.role());
            assert_eq!(pair[0].text, "the task");
            assert_eq!(pair[1].role, agent.name());
        }
    }

    // Each call replays the agent's own history, never the other agent's
    let payloads = backend.payloads();
    assert_eq!(payloads[2], "[A role] the task\n[A] still thinking\n[A role] the task");
    assert!(!payloads[3].contains("[A"));
}

#[tokio::test]
async fn test_cancellation_mid_call() {
    let cancel = CancellationToken::new();
    let backend = ScriptedBackend::new(vec![
        reply("one"),
        reply("two"),
        Step::CancelAndHang(cancel.clone()),
    ]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", backend.clone()), agent("B", backend.clone())],
        DriverSettings::new(6, "DONE:"),
    )
    .unwrap();

    let report = driver.run(&observer, &cancel).await.unwrap();

    assert_eq!(report.state, ConversationState::Cancelled);
    assert_eq!(report.records.len(), 2);
    assert_eq!(backend.calls(), 3);

    let events = observer.session(&session());
    assert_eq!(turns(&events), 2);
    assert_eq!(events.last(), Some(&ConversationEvent::Cancelled));
}

#[tokio::test]
async fn test_abort_on_backend_error() {
    let backend = ScriptedBackend::new(vec![reply("fine"), Step::Fail("502 Bad Gateway".into())]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", backend.clone()), agent("B", backend.clone())],
        DriverSettings::new(6, "DONE:"),
    )
    .unwrap();

    let err = driver
        .run(&observer, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PalaverError::Upstream(_)));
    assert_eq!(driver.state(), &ConversationState::Aborted);
    assert_eq!(backend.calls(), 2);

    // The failed agent keeps the prompt it never answered
    assert!(driver.agents()[1].has_unanswered_prompt());
    assert_eq!(driver.agents()[1].context().len(), 1);

    let events = observer.session(&session());
    assert!(matches!(events[events.len() - 2], ConversationEvent::TurnFailed { turn: 2, .. }));
    assert!(matches!(events.last(), Some(ConversationEvent::Aborted { .. })));
}

#[tokio::test]
async fn test_continue_on_backend_error() {
    let backend = ScriptedBackend::new(vec![
        Step::Fail("timeout".into()),
        reply("b speaks"),
        reply("DONE: rest"),
    ]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", backend.clone()), agent("B", backend.clone())],
        DriverSettings::new(6, "DONE:").with_error_policy(ErrorPolicy::Continue),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.invocations, 3);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.recommendation(), Some("rest"));

    // A's second attempt replays the dangling prompt from its failed turn
    assert_eq!(backend.payloads()[2], "[A role] T\n[A role] T");
}

#[tokio::test]
async fn test_rightmost_marker_wins() {
    let backend = ScriptedBackend::new(vec![reply(
        "DONE: draft\nmore thoughts\nDONE:  final answer  ",
    )]);
    let observer = CollectingObserver::new();

    let mut driver = RoundRobinDriver::new(
        session(),
        "T",
        vec![agent("A", backend)],
        DriverSettings::new(2, "DONE:"),
    )
    .unwrap();

    let report = driver.run(&observer, &CancellationToken::new()).await.unwrap();
    assert_eq!(report.recommendation(), Some("final answer"));
}
