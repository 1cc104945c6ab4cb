//! Types for the research orchestration engine

use chrono::{DateTime, Utc};
use deepresearch_core::{CoreResult, Learning, ResearchError, SearchResult};
use serde::{Deserialize, Serialize};

/// The shared research accumulator, threaded through every recursive
/// expansion branch. Exactly one per run; mutated in place by the
/// currently executing branch only.
///
/// `sources` doubles as the duplicate-URL filter memory: every relevance
/// evaluation sees the full current list, so a URL accepted anywhere in
/// the run is never accepted again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    /// The original prompt; set once on first entry, never overwritten
    pub root_query: Option<String>,
    /// Most recently generated sub-query batch (overwritten per level)
    pub queries: Vec<String>,
    /// Every accepted search result, in discovery order (append-only)
    pub sources: Vec<SearchResult>,
    /// One learning per accepted source (append-only)
    pub learnings: Vec<Learning>,
    /// Sub-queries that produced an accepted result (append-only)
    pub completed_queries: Vec<String>,
}

impl ResearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a URL is already present among accepted sources
    pub fn contains_url(&self, url: &str) -> bool {
        self.sources.iter().any(|s| s.url == url)
    }
}

/// Input accepted for one end-to-end research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// The natural-language research prompt
    pub prompt: String,
    /// Report recipients (email addresses, at least one)
    pub recipients: Vec<String>,
    /// Recursion depth; 0 skips research entirely
    pub depth: usize,
    /// Sub-queries per expansion level, 1 to 5
    pub breadth: usize,
}

impl ResearchRequest {
    pub fn new(prompt: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            recipients,
            depth: 2,
            breadth: 3,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_breadth(mut self, breadth: usize) -> Self {
        self.breadth = breadth;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(ResearchError::validation("prompt must not be empty"));
        }
        if self.recipients.is_empty() {
            return Err(ResearchError::validation(
                "at least one recipient is required",
            ));
        }
        for recipient in &self.recipients {
            if !recipient.contains('@') {
                return Err(ResearchError::validation(format!(
                    "invalid recipient address: {recipient}"
                )));
            }
        }
        if !(1..=5).contains(&self.breadth) {
            return Err(ResearchError::validation(format!(
                "breadth must be between 1 and 5, got {}",
                self.breadth
            )));
        }
        Ok(())
    }
}

/// One timestamped entry in the run's progress timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ProgressEventKind,
}

/// Closed set of progress-event kinds. Consumers match exhaustively so a
/// new kind cannot be silently ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressEventKind {
    /// A retrieval attempt is starting for this query
    SearchingWeb { query: String },
    /// A source passed relevance evaluation and was accepted
    SearchResults {
        title: Option<String>,
        url: String,
        favicon_url: Option<String>,
    },
    /// A learning was distilled from the latest accepted source
    Learning { text: String },
    /// The entire expansion tree has completed
    ResearchCompleted,
    /// Report synthesis is starting
    StartingReportGeneration,
    /// Report synthesis finished
    ReportGenerated,
    /// Report dispatch is starting
    SendingReport,
    /// Terminal event of a successful run
    ReportSent,
}

impl ProgressEventKind {
    /// Whether this kind terminates a successful run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReportSent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_and_validation() {
        let request = ResearchRequest::new("impact of X on Y", vec!["a@b.com".to_string()]);
        assert_eq!(request.depth, 2);
        assert_eq!(request.breadth, 3);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn request_rejects_empty_recipients() {
        let request = ResearchRequest::new("topic", vec![]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn request_rejects_bad_address_and_breadth() {
        let request = ResearchRequest::new("topic", vec!["not-an-address".to_string()]);
        assert!(request.validate().is_err());

        let request =
            ResearchRequest::new("topic", vec!["a@b.com".to_string()]).with_breadth(6);
        assert!(request.validate().is_err());
    }

    #[test]
    fn state_tracks_accepted_urls() {
        let mut state = ResearchState::new();
        assert!(!state.contains_url("https://example.com"));
        state.sources.push(SearchResult::new(
            None,
            "https://example.com",
            "content",
            None,
        ));
        assert!(state.contains_url("https://example.com"));
    }

    #[test]
    fn progress_event_serializes_with_kebab_case_tag() {
        let event = ProgressEvent {
            timestamp: Utc::now(),
            kind: ProgressEventKind::SearchingWeb {
                query: "rust async".to_string(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "searching-web");
        assert_eq!(json["query"], "rust async");

        let event = ProgressEvent {
            timestamp: Utc::now(),
            kind: ProgressEventKind::ReportSent,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "report-sent");
        assert!(event.kind.is_terminal());
    }
}
