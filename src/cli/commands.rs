//! CLI commands
//!
//! Each subcommand builds its roster from the loaded configuration, runs,
//! and prints results to stdout.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::{
    run_conversation, ConversationJob, ConversationReport, ConversationState, DriverSettings,
    Fanout, Roster, TracingObserver,
};
use crate::analysis::{parse_records, run_chunks, BatchPlan, ChunkOutcome, DiaryPrompt, Scorer};
use crate::cli::console::ConsoleObserver;
use crate::core::{Config, PalaverError, Result, SessionId};
use crate::llm::ModelClient;

fn observer(config: &Config, concurrent: bool) -> Fanout {
    let console = ConsoleObserver::new(config.conversation.display_limit);
    let console = if concurrent {
        console.with_sessions()
    } else {
        console
    };
    Fanout::new(vec![Box::new(console), Box::new(TracingObserver)])
}

fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        PalaverError::Other(format!("Failed to read {}: {}", path.display(), e))
    })
}

/// Run a free-form task through the configured roster
pub async fn run_task(
    config: &Config,
    task: &str,
    cancel: &CancellationToken,
) -> Result<ConversationReport> {
    let roster = Roster::build(config)?;
    let settings = DriverSettings::from(&config.conversation);
    let job = ConversationJob::new(SessionId::random(), task);

    run_conversation(&roster, &settings, job, &observer(config, false), cancel).await
}

/// Analyse one user's diary records
pub async fn run_diary(
    config: &Config,
    path: &Path,
    user: Option<&str>,
    cancel: &CancellationToken,
) -> Result<ConversationReport> {
    let records = parse_records(&read_to_string(path)?)?;
    let user_id = match user {
        Some(user) => user.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "user".to_string()),
    };

    let task = DiaryPrompt::new(&user_id, &records, &config.conversation.final_marker).render()?;
    let roster = Roster::build(config)?;
    let settings = DriverSettings::from(&config.conversation);
    let job = ConversationJob::new(SessionId::new(user_id), task);

    run_conversation(&roster, &settings, job, &observer(config, false), cancel).await
}

/// Analyse a record set in concurrent chunks
///
/// Each chunk gets an analysis conversation and, unless disabled, a
/// follow-up conversation on the follow-up roster. Returns the number of
/// chunks that failed.
pub async fn run_batch(
    config: &Config,
    path: &Path,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<usize> {
    let records = parse_records(&read_to_string(path)?)?;
    info!(
        records = records.len(),
        chunk_size = config.batch.chunk_size,
        followup = config.batch.followup,
        "batch starting"
    );

    let analysis = Roster::build(config)?;
    let followup = if config.batch.followup {
        Some(Roster::build_followup(config)?)
    } else {
        None
    };
    let settings = DriverSettings::from(&config.conversation);
    let plan = BatchPlan {
        analysis: &analysis,
        followup: followup.as_ref(),
        settings: &settings,
    };

    let outcomes = run_chunks(
        &records,
        config.batch.chunk_size,
        plan,
        &observer(config, true),
        cancel,
    )
    .await?;

    let mut log = Vec::new();
    println!("Batch summary:");
    for outcome in &outcomes {
        println!("  {:<24} {}", outcome.label(), summarize(outcome));
        log.extend(outcome.log_entries());
    }

    if let Some(output) = output {
        fs::write(output, serde_json::to_string_pretty(&log)?)?;
        println!("Conversation log written to {}", output.display());
    }

    Ok(outcomes.iter().filter(|o| o.failed()).count())
}

fn summarize(outcome: &ChunkOutcome) -> String {
    let phase = |result: &Result<ConversationReport>| match result {
        Ok(report) => describe(&report.state),
        Err(err) => format!("failed: {}", err),
    };

    match outcome.followup {
        Some(ref followup) => format!(
            "analysis {}; follow-up {}",
            phase(&outcome.analysis),
            phase(followup)
        ),
        None => format!("analysis {}", phase(&outcome.analysis)),
    }
}

/// Score each non-empty line of a transcript, one JSON object per line
pub async fn run_score(config: &Config, path: &Path, cancel: &CancellationToken) -> Result<()> {
    let content = read_to_string(path)?;
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let scorer = Scorer::new(Arc::new(ModelClient::from_config(&config.backend)?));
    let sheets = scorer.score_until_cancelled(&lines, cancel).await?;

    for (line, sheet) in lines.iter().zip(sheets) {
        println!("{}", json!({ "utterance": line, "scores": sheet }));
    }
    Ok(())
}

/// Effective configuration as TOML, with keys masked
pub fn show_config(config: &Config) -> Result<String> {
    let mut shown = config.clone();
    let mask = |key: &mut Option<String>| {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    };
    mask(&mut shown.backend.api_key);
    if let Some(ref mut backend) = shown.batch.followup_backend {
        mask(&mut backend.api_key);
    }
    for agent in &mut shown.agents {
        if let Some(ref mut backend) = agent.backend {
            mask(&mut backend.api_key);
        }
    }

    toml::to_string_pretty(&shown)
        .map_err(|e| PalaverError::config(format!("Failed to serialize config: {}", e)))
}

/// One-line summary of a finished conversation
pub fn describe(state: &ConversationState) -> String {
    match state {
        ConversationState::Running => "running".to_string(),
        ConversationState::Completed {
            recommendation: Some(_),
        } => "completed with recommendation".to_string(),
        ConversationState::Completed {
            recommendation: None,
        } => "completed without recommendation".to_string(),
        ConversationState::Cancelled => "cancelled".to_string(),
        ConversationState::Aborted => "aborted".to_string(),
    }
}
