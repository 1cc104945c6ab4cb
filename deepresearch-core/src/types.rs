//! Core data type definitions shared across the provider seams

use serde::{Deserialize, Serialize};

/// One retrieved web document. The URL is the identity key: two results
/// with the same URL are the same source for deduplication purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page title, when the provider supplies one
    pub title: Option<String>,
    /// Canonical URL (identity key)
    pub url: String,
    /// Raw retrieved text content
    pub content: String,
    /// Favicon URL, when available
    #[serde(rename = "faviconUrl")]
    pub favicon_url: Option<String>,
}

impl SearchResult {
    pub fn new(
        title: Option<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        favicon_url: Option<String>,
    ) -> Self {
        Self {
            title,
            url: url.into(),
            content: content.into(),
            favicon_url,
        }
    }
}

/// A distilled finding extracted from one accepted search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learning {
    /// The finding itself
    #[serde(alias = "learning")]
    pub text: String,
    /// Follow-up questions that seed the next recursion level; bounded by
    /// the breadth parameter in effect when the learning was extracted
    #[serde(rename = "followUpQuestions")]
    pub follow_up_questions: Vec<String>,
}
