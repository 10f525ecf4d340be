//! Chunked batch analysis
//!
//! Splits a large record set into fixed-size chunks and analyses them
//! concurrently. Each chunk goes through two conversations: an analysis of
//! the raw records, then an optional follow-up that turns everything said
//! in the analysis into care recommendations, usually on a stronger model.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::agent::{
    run_conversation, ConversationJob, ConversationReport, ConversationState, DriverSettings,
    Observer, Roster,
};
use crate::core::{PalaverError, Result, SessionId, TurnRecord};

/// One slice of the record set
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<'a> {
    /// Index of the first record in the full set
    pub start: usize,
    pub records: &'a [Value],
    pub total: usize,
}

impl Chunk<'_> {
    /// Index of the last record in the full set
    pub fn end(&self) -> usize {
        self.start + self.records.len().saturating_sub(1)
    }

    pub fn label(&self) -> String {
        format!("records-{}-{}", self.start, self.end())
    }

    pub fn prompt(&self, final_marker: &str) -> Result<String> {
        Ok(format!(
            "目前正在處理第 {start} 至 {end} 筆資料（共 {total} 筆）。\n\
             以下為該批次資料:\n{data}\n\n\
             請根據以上資料進行詳細分析，識別出日常行為特徵與照護需求，並整理出關鍵數據，作為後續照護建議的參考。\n\
             請提供一份完整的分析結果摘要，並以『{marker}』開頭輸出最終摘要。",
            start = self.start,
            end = self.end(),
            total = self.total,
            data = serde_json::to_string(self.records)?,
            marker = final_marker,
        ))
    }

    /// Analysis job for this chunk, tagged with its record range
    pub fn job(&self, final_marker: &str) -> Result<ConversationJob> {
        Ok(ConversationJob::new(
            SessionId::new(self.label()),
            self.prompt(final_marker)?,
        ))
    }
}

/// Split `records` into chunks of at most `chunk_size`
pub fn chunks(records: &[Value], chunk_size: usize) -> Result<Vec<Chunk<'_>>> {
    if chunk_size == 0 {
        return Err(PalaverError::config("chunk size must be at least 1"));
    }

    Ok(records
        .chunks(chunk_size)
        .enumerate()
        .map(|(i, slice)| Chunk {
            start: i * chunk_size,
            records: slice,
            total: records.len(),
        })
        .collect())
}

/// Task for the follow-up conversation, built from every analysis reply
pub fn followup_prompt(analysis: &ConversationReport, final_marker: &str) -> String {
    let summary = analysis
        .records
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "根據以下先前的分析結果，請整合並產出一份完整且具參考價值的照護建議：\n\n\
         {summary}\n\n\
         請提供具體建議（例如餵食、睡眠、尿布更換等）與相關參考資訊，並以『{marker}』開頭輸出最終建議。",
        summary = summary,
        marker = final_marker,
    )
}

/// Which conversation of a chunk a turn belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analysis,
    Followup,
}

/// Rosters and settings shared by every chunk
#[derive(Debug, Clone, Copy)]
pub struct BatchPlan<'a> {
    pub analysis: &'a Roster,
    /// Skipped when `None`
    pub followup: Option<&'a Roster>,
    pub settings: &'a DriverSettings,
}

/// Both conversations of one chunk
#[derive(Debug)]
pub struct ChunkOutcome {
    pub start: usize,
    pub end: usize,
    pub analysis: Result<ConversationReport>,
    /// `None` when the follow-up was disabled or never started
    pub followup: Option<Result<ConversationReport>>,
}

/// One turn of the batch log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchLogEntry {
    pub phase: Phase,
    pub batch_start: usize,
    pub batch_end: usize,
    #[serde(flatten)]
    pub record: TurnRecord,
}

impl ChunkOutcome {
    pub fn label(&self) -> String {
        format!("records-{}-{}", self.start, self.end)
    }

    pub fn failed(&self) -> bool {
        self.analysis.is_err() || matches!(self.followup, Some(Err(_)))
    }

    /// Successful turns of both phases, analysis first
    pub fn log_entries(&self) -> Vec<BatchLogEntry> {
        let phases = [
            (Phase::Analysis, self.analysis.as_ref().ok()),
            (
                Phase::Followup,
                self.followup.as_ref().and_then(|r| r.as_ref().ok()),
            ),
        ];

        phases
            .into_iter()
            .filter_map(|(phase, report)| report.map(|r| (phase, r)))
            .flat_map(|(phase, report)| {
                report.records.iter().map(move |record| BatchLogEntry {
                    phase,
                    batch_start: self.start,
                    batch_end: self.end,
                    record: record.clone(),
                })
            })
            .collect()
    }
}

async fn run_chunk(
    chunk: &Chunk<'_>,
    plan: BatchPlan<'_>,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> ChunkOutcome {
    let marker = plan.settings.final_marker.as_str();
    let analysis = match chunk.job(marker) {
        Ok(job) => run_conversation(plan.analysis, plan.settings, job, observer, cancel).await,
        Err(err) => Err(err),
    };

    let followup = match (&analysis, plan.followup) {
        (Ok(report), Some(roster))
            if report.state != ConversationState::Cancelled && !report.records.is_empty() =>
        {
            debug!(chunk = %chunk.label(), "starting follow-up");
            let job = ConversationJob::new(
                SessionId::new(format!("{}-followup", chunk.label())),
                followup_prompt(report, marker),
            );
            Some(run_conversation(roster, plan.settings, job, observer, cancel).await)
        }
        _ => None,
    };

    ChunkOutcome {
        start: chunk.start,
        end: chunk.end(),
        analysis,
        followup,
    }
}

/// Split `records` and run every chunk concurrently
///
/// Outcomes line up with the chunks. A failing chunk never stops its
/// siblings.
pub async fn run_chunks(
    records: &[Value],
    chunk_size: usize,
    plan: BatchPlan<'_>,
    observer: &dyn Observer,
    cancel: &CancellationToken,
) -> Result<Vec<ChunkOutcome>> {
    let chunks = chunks(records, chunk_size)?;
    debug!(chunks = chunks.len(), followup = plan.followup.is_some(), "running batch");

    let outcomes = join_all(
        chunks
            .iter()
            .map(|chunk| run_chunk(chunk, plan, observer, cancel)),
    )
    .await;

    for outcome in outcomes.iter().filter(|o| o.failed()) {
        warn!(chunk = %outcome.label(), "chunk failed");
    }
    Ok(outcomes)
}
