//! Sentinel detection
//!
//! A reply that contains the final marker ends the conversation; whatever
//! follows the rightmost occurrence is the deliverable.

/// Case-sensitive sentinel matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalMarker {
    marker: String,
}

impl FinalMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.marker
    }

    /// Whether `text` contains the marker
    pub fn is_present(&self, text: &str) -> bool {
        !self.marker.is_empty() && text.contains(&self.marker)
    }

    /// Trimmed text after the rightmost marker, if any
    pub fn extract(&self, text: &str) -> Option<String> {
        if self.marker.is_empty() {
            return None;
        }
        text.rfind(&self.marker)
            .map(|idx| text[idx + self.marker.len()..].trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_after_marker() {
        let marker = FinalMarker::new("DONE:");
        assert_eq!(marker.extract("DONE: go home"), Some("go home".to_string()));
        assert_eq!(
            marker.extract("analysis...\nDONE:\n  sleep early \n"),
            Some("sleep early".to_string())
        );
    }

    #[test]
    fn test_rightmost_occurrence_wins() {
        let marker = FinalMarker::new("DONE:");
        assert_eq!(
            marker.extract("DONE: draft DONE: final"),
            Some("final".to_string())
        );
    }

    #[test]
    fn test_case_sensitive() {
        let marker = FinalMarker::new("DONE:");
        assert!(!marker.is_present("done: nope"));
        assert_eq!(marker.extract("done: nope"), None);
    }

    #[test]
    fn test_marker_at_end_yields_empty() {
        let marker = FinalMarker::new("DONE:");
        assert_eq!(marker.extract("all set DONE:"), Some(String::new()));
    }

    #[test]
    fn test_multibyte_marker() {
        let marker = FinalMarker::new("最終建議：");
        assert_eq!(
            marker.extract("分析如下。最終建議：每天散步十分鐘"),
            Some("每天散步十分鐘".to_string())
        );
    }
}
