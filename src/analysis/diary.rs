//! Diary analysis prompts
//!
//! Builds the task handed to the analyst/coach roster for one user's mood
//! diary. Only the first few records are shown to keep the prompt short.

use serde_json::Value;

use crate::core::{PalaverError, Result};

/// Records shown verbatim in the prompt
pub const PREVIEW_RECORDS: usize = 5;

const OMITTED: &str = "... (以下省略)";

/// Task prompt for one user's diary
#[derive(Debug, Clone)]
pub struct DiaryPrompt<'a> {
    user_id: &'a str,
    records: &'a [Value],
    final_marker: &'a str,
}

impl<'a> DiaryPrompt<'a> {
    pub fn new(user_id: &'a str, records: &'a [Value], final_marker: &'a str) -> Self {
        Self {
            user_id,
            records,
            final_marker,
        }
    }

    /// Pretty-printed preview of the leading records
    pub fn preview(&self) -> Result<String> {
        let shown = &self.records[..self.records.len().min(PREVIEW_RECORDS)];
        let mut text = serde_json::to_string_pretty(shown)?;
        if self.records.len() > PREVIEW_RECORDS {
            text.push('\n');
            text.push_str(OMITTED);
        }
        Ok(text)
    }

    pub fn render(&self) -> Result<String> {
        Ok(format!(
            "目前正在處理用戶 {user} 的日記，共 {count} 則。\n\
             日記內容（僅顯示前 {preview} 筆）：\n{records}\n\n\
             請仔細分析上述日記，找出用戶的情緒與思考模式，並根據你的分析生成一段全新的正向心情建議，內容必須包含：\n\
             1. 情緒與思考模式的詳細分析\n\
             2. 實際可行的行動方案建議\n\
             3. AI 教練如何提供個性化互動建議\n\n\
             請注意：請僅生成全新內容，不要重複上述提示。請在回覆最後直接輸出最終建議，格式必須以『{marker}』開頭。",
            user = self.user_id,
            count = self.records.len(),
            preview = PREVIEW_RECORDS,
            records = self.preview()?,
            marker = self.final_marker,
        ))
    }
}

/// Parse a JSON array of diary records
pub fn parse_records(content: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(records) => Ok(records),
        other => Err(PalaverError::Other(format!(
            "expected a JSON array of records, found {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"日期": format!("2024-03-{:02}", i + 1), "心情指數": i}))
            .collect()
    }

    #[test]
    fn test_short_diary_shows_everything() {
        let records = records(3);
        let prompt = DiaryPrompt::new("u42", &records, "最終建議：");
        let preview = prompt.preview().unwrap();
        assert!(preview.contains("2024-03-03"));
        assert!(!preview.contains(OMITTED));
    }

    #[test]
    fn test_long_diary_is_truncated() {
        let records = records(8);
        let prompt = DiaryPrompt::new("u42", &records, "最終建議：");
        let text = prompt.render().unwrap();

        assert!(text.contains("用戶 u42 的日記，共 8 則"));
        assert!(text.contains("2024-03-05"));
        assert!(!text.contains("2024-03-06"));
        assert!(text.contains(OMITTED));
        assert!(text.ends_with("『最終建議：』開頭。"));
    }

    #[test]
    fn test_parse_records() {
        assert_eq!(parse_records(r#"[{"a": 1}, {"a": 2}]"#).unwrap().len(), 2);
        assert!(parse_records(r#"{"a": 1}"#).is_err());
        assert!(parse_records("not json").is_err());
    }
}
