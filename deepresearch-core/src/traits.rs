//! Provider trait seams
//!
//! The engine never talks to an LLM, a search API or an email API
//! directly; it goes through these object-safe traits so that production
//! adapters and test stubs are interchangeable.

use crate::error::CoreResult;
use crate::types::SearchResult;
use async_trait::async_trait;

/// Black-box text generator (LLM). Used for query generation, relevance
/// evaluation, learning extraction and report synthesis.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate free text (possibly containing JSON the caller parses)
    /// from an optional system prompt and a user prompt.
    async fn generate(&self, system: Option<&str>, prompt: &str) -> CoreResult<String>;
}

/// Web search provider returning at most one best-ranked result per query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// `Ok(None)` means the provider had zero results for the query,
    /// which is not an error.
    async fn search(&self, query: &str) -> CoreResult<Option<SearchResult>>;
}

/// Outbound email delivery provider.
#[async_trait]
pub trait ReportDelivery: Send + Sync {
    /// One send addressed to all recipients.
    async fn send(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        html_body: &str,
    ) -> CoreResult<()>;
}
