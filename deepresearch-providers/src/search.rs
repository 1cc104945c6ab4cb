//! Web search via the Exa search API
//!
//! Always asks for the single best-ranked hit with freshly crawled page
//! content. Zero results is a normal outcome, not an error.

use deepresearch_core::{
    async_trait, CoreResult, ResearchError, SearchConfig, SearchProvider, SearchResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchBody {
    query: String,
    num_results: usize,
    contents: ExaContentsSpec,
}

#[derive(Debug, Serialize)]
struct ExaContentsSpec {
    text: bool,
    livecrawl: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExaSearchResponse {
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: String,
    favicon: Option<String>,
}

impl From<ExaResult> for SearchResult {
    fn from(result: ExaResult) -> Self {
        SearchResult::new(result.title, result.url, result.text, result.favicon)
    }
}

/// Exa-backed implementation of the search seam
pub struct ExaSearchClient {
    http: reqwest::Client,
    config: SearchConfig,
    api_key: String,
}

impl ExaSearchClient {
    pub fn new(config: SearchConfig) -> CoreResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ResearchError::config("Exa API key not found"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for ExaSearchClient {
    async fn search(&self, query: &str) -> CoreResult<Option<SearchResult>> {
        let body = ExaSearchBody {
            query: query.to_string(),
            num_results: self.config.num_results,
            contents: ExaContentsSpec {
                text: true,
                livecrawl: if self.config.livecrawl {
                    "always"
                } else {
                    "fallback"
                },
            },
        };

        let response = self
            .http
            .post(format!("{}/search", self.config.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::retrieval(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ResearchError::retrieval(format!(
                "search provider returned {status}: {detail}"
            )));
        }

        let parsed: ExaSearchResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::retrieval(format!("malformed search response: {e}")))?;

        debug!(query, hits = parsed.results.len(), "Search completed");

        Ok(parsed.results.into_iter().next().map(SearchResult::from))
    }
}
