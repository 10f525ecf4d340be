//! Structured scoring of single utterances
//!
//! The model is asked to mark each coding item with `"1"` or leave it
//! empty, replying in JSON. Anything that cannot be read that way is
//! replaced by an all-empty sheet so one bad reply never fails a batch.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{PalaverError, Result};
use crate::llm::ModelClient;

/// Coding items for shared-reading dialogue
pub const DEFAULT_SCORE_ITEMS: &[&str] = &[
    "引導",
    "評估(口語、跟讀的內容有關)",
    "評估(非口語、寶寶自發性動作、跟讀的內容有關)",
    "延伸討論",
    "複述",
    "開放式問題",
    "填空",
    "回想",
    "人事時地物問句",
    "連結生活經驗",
    "備註",
];

/// Item values in item order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSheet {
    values: Vec<(String, String)>,
}

impl ScoreSheet {
    /// Every item present with an empty value
    pub fn empty<S: AsRef<str>>(items: &[S]) -> Self {
        Self {
            values: items
                .iter()
                .map(|i| (i.as_ref().to_string(), String::new()))
                .collect(),
        }
    }

    /// Read a model reply; missing items are filled with empty values
    pub fn parse<S: AsRef<str>>(reply: &str, items: &[S]) -> Result<Self> {
        let body = strip_code_fence(reply);
        let object: Map<String, Value> = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(PalaverError::malformed("score reply is not a JSON object")),
            Err(e) => return Err(PalaverError::malformed(format!("score reply: {}", e))),
        };

        let values = items
            .iter()
            .map(|item| {
                let item = item.as_ref();
                let value = match object.get(item) {
                    Some(Value::String(s)) => s.trim().to_string(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(true)) => "1".to_string(),
                    _ => String::new(),
                };
                (item.to_string(), value)
            })
            .collect();

        Ok(Self { values })
    }

    /// [`ScoreSheet::parse`], substituting an empty sheet on failure
    pub fn parse_or_empty<S: AsRef<str>>(reply: &str, items: &[S]) -> Self {
        Self::parse(reply, items).unwrap_or_else(|err| {
            warn!("{}; using empty score sheet", err);
            Self::empty(items)
        })
    }

    pub fn get(&self, item: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == item)
            .map(|(_, v)| v.as_str())
    }

    /// Items marked with a non-empty value
    pub fn marked(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.marked().next().is_none()
    }
}

impl Serialize for ScoreSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Scores utterances one model call each
pub struct Scorer {
    client: Arc<ModelClient>,
    items: Vec<String>,
    concurrency: usize,
}

impl Scorer {
    pub fn new(client: Arc<ModelClient>) -> Self {
        Self {
            client,
            items: DEFAULT_SCORE_ITEMS.iter().map(|s| s.to_string()).collect(),
            concurrency: 4,
        }
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Instruction line followed by the utterance
    pub fn prompt_lines(&self, utterance: &str) -> Vec<String> {
        vec![
            format!(
                "你是一位親子對話分析專家，請根據以下編碼規則評估家長唸故事書時的每一句話，判斷是否觸及下列各項：\n{}\n\n\
                 請依據評估結果，對每個項目：若觸及則標記為 1，否則留空，\
                 請僅以有效 JSON 格式回覆，鍵為項目名稱，值為 '1' 或空字串。",
                self.items.join("\n")
            ),
            utterance.to_string(),
        ]
    }

    /// Score one utterance; backend and parse failures yield an empty sheet
    pub async fn score(&self, utterance: &str) -> ScoreSheet {
        match self.client.generate(&self.prompt_lines(utterance)).await {
            Ok(generation) => ScoreSheet::parse_or_empty(&generation.text, &self.items),
            Err(err) => {
                warn!("scoring call failed: {}; using empty score sheet", err);
                ScoreSheet::empty(&self.items)
            }
        }
    }

    /// Score every utterance, keeping input order
    pub async fn score_all<S: AsRef<str>>(&self, utterances: &[S]) -> Vec<ScoreSheet> {
        debug!(count = utterances.len(), concurrency = self.concurrency, "scoring");
        stream::iter(utterances.iter())
            .map(|u| self.score(u.as_ref()))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// [`Scorer::score_all`], abandoned with [`PalaverError::Cancelled`]
    /// once `cancel` fires
    pub async fn score_until_cancelled<S: AsRef<str>>(
        &self,
        utterances: &[S],
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoreSheet>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("scoring cancelled");
                Err(PalaverError::Cancelled)
            }
            sheets = self.score_all(utterances) => Ok(sheets),
        }
    }
}
