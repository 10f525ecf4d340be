//! Analysis module - task builders and structured replies
//!
//! Diary prompts, two-phase chunked batch runs, and JSON scoring of single
//! utterances.

pub mod batch;
pub mod diary;
pub mod scoring;

pub use batch::{
    chunks, followup_prompt, run_chunks, BatchLogEntry, BatchPlan, Chunk, ChunkOutcome, Phase,
};
pub use diary::{parse_records, DiaryPrompt};
pub use scoring::{ScoreSheet, Scorer, DEFAULT_SCORE_ITEMS};
