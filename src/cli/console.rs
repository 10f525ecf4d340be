//! Console rendering of conversation events

use std::borrow::Cow;

use crate::agent::Observer;
use crate::core::{ConversationEvent, SessionEvent};

const TRUNCATED: &str = "... (內容過長)";

/// Cut `text` to `limit` characters, marking the cut
pub fn truncate_for_display(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => Cow::Owned(format!("{}{}", &text[..byte_idx], TRUNCATED)),
        None => Cow::Borrowed(text),
    }
}

/// Prints events to stdout as they arrive
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    display_limit: usize,
    show_session: bool,
}

impl ConsoleObserver {
    pub fn new(display_limit: usize) -> Self {
        Self {
            display_limit,
            show_session: false,
        }
    }

    /// Prefix every line with its session, for concurrent runs
    pub fn with_sessions(mut self) -> Self {
        self.show_session = true;
        self
    }

    fn render(&self, event: &ConversationEvent) -> String {
        match event {
            ConversationEvent::Started { agents } => {
                format!("🤖 系統：正在啟動 {} 的協作...", agents.join("、"))
            }
            ConversationEvent::Turn(record) => format!(
                "🤖 [{}]：{}",
                record.role,
                truncate_for_display(&record.text, self.display_limit)
            ),
            ConversationEvent::TurnFailed { agent, message, .. } => {
                format!("⚠️ [{}] 發生錯誤：{}", agent, message)
            }
            ConversationEvent::Recommendation { text } => format!("✅ 最終建議：\n{}", text),
            ConversationEvent::NoRecommendation => "ℹ️ 對話結束，未取得最終建議。".to_string(),
            ConversationEvent::Cancelled => "⏹ 對話已取消。".to_string(),
            ConversationEvent::Aborted { message } => format!("❌ 分析過程出現錯誤: {}", message),
        }
    }
}

impl Observer for ConsoleObserver {
    fn publish(&self, event: SessionEvent) {
        let line = self.render(&event.event);
        if self.show_session {
            println!("[{}] {}\n", event.session, line);
        } else {
            println!("{}\n", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TurnRecord;

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate_for_display("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate_for_display("日記內容很長", 2), "日記... (內容過長)");
    }

    #[test]
    fn test_render_turn_uses_role() {
        let console = ConsoleObserver::new(4);
        let line = console.render(&ConversationEvent::Turn(TurnRecord {
            turn: 1,
            agent: "ai_coach".to_string(),
            role: "AI 教練".to_string(),
            text: "abcdefgh".to_string(),
            usage: None,
        }));
        assert_eq!(line, "🤖 [AI 教練]：abcd... (內容過長)");
    }
}
