//! Per-agent conversation history
//!
//! Append-only; the full history is replayed to the backend on every turn.

use crate::core::Utterance;

/// Ordered, append-only history owned by exactly one agent
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    entries: Vec<Utterance>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a labeled utterance at the end
    pub fn append(&mut self, role: impl Into<String>, text: impl Into<String>) {
        self.entries.push(Utterance::new(role, text));
    }

    /// Formatted lines in insertion order
    ///
    /// Returns an owned copy, so later appends never affect a snapshot
    /// already handed out.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().map(Utterance::format_line).collect()
    }

    /// Raw entries in insertion order
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut ctx = ContextManager::new();
        ctx.append("分析專家", "task");
        ctx.append("analysis_expert", "reply");
        ctx.append("分析專家", "task");

        assert_eq!(ctx.len(), 3);
        assert_eq!(
            ctx.snapshot(),
            vec!["[分析專家] task", "[analysis_expert] reply", "[分析專家] task"]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut ctx = ContextManager::new();
        ctx.append("a", "same");
        ctx.append("a", "same");
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut ctx = ContextManager::new();
        ctx.append("a", "1");
        let snap = ctx.snapshot();
        ctx.append("b", "2");

        assert_eq!(snap.len(), 1);
        assert_eq!(ctx.last().unwrap().text, "2");
    }
}
