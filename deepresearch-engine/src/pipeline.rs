//! LLM pipeline adapters and the search-and-process loop
//!
//! The adapters wrap the black-box text generator: each one serializes
//! its inputs into a prompt, asks for JSON, and parses the reply. Every
//! external call runs through the shared [`StepRunner`], so exhausting
//! that retry budget is a hard failure for the whole run.

use crate::progress::ProgressLog;
use crate::types::{ProgressEventKind, ResearchState};
use chrono::Utc;
use deepresearch_core::{
    CoreResult, Learning, ResearchError, SearchProvider, SearchResult, StepRunner, TextGenerator,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Bounded attempts for the retrieve-and-evaluate loop. Empty retrievals
/// and irrelevant candidates consume attempts; hard provider failures do
/// not get absorbed here.
pub const MAX_SEARCH_ATTEMPTS: usize = 3;

/// Extract the first top-level JSON array from free text. The generator
/// is asked for bare JSON but may wrap it in prose or code fences.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract the first top-level JSON object from free text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Expands a prompt into a batch of semantically distinct sub-queries
#[derive(Clone)]
pub struct QueryGenerator {
    generator: Arc<dyn TextGenerator>,
    steps: StepRunner,
}

impl QueryGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, steps: StepRunner) -> Self {
        Self { generator, steps }
    }

    /// Generate `n` (1 to 5) sub-queries for `query`.
    pub async fn generate(&self, query: &str, n: usize) -> CoreResult<Vec<String>> {
        if !(1..=5).contains(&n) {
            return Err(ResearchError::validation(format!(
                "query batch size must be between 1 and 5, got {n}"
            )));
        }

        let prompt = format!(
            "Generate {n} search queries for the following query: {query}. \
             The queries must be semantically distinct and broaden or deepen \
             coverage of the topic. Current date: {date}. \
             Respond with a JSON array of {n} strings and nothing else.",
            date = Utc::now().to_rfc3339(),
        );

        let generator = self.generator.clone();
        let mut queries = self
            .steps
            .run("generate-search-queries", move || {
                let generator = generator.clone();
                let prompt = prompt.clone();
                Box::pin(async move {
                    let text = generator.generate(None, &prompt).await?;
                    let json = extract_json_array(&text).ok_or_else(|| {
                        ResearchError::generation("no JSON array in query batch response")
                    })?;
                    let queries: Vec<String> = serde_json::from_str(json).map_err(|e| {
                        ResearchError::generation(format!("malformed query batch: {e}"))
                    })?;
                    if queries.is_empty() {
                        return Err(ResearchError::generation("empty query batch"));
                    }
                    Ok(queries)
                })
            })
            .await?;

        queries.truncate(n);
        debug!(count = queries.len(), "Generated sub-queries");
        Ok(queries)
    }
}

#[derive(Debug, Deserialize)]
struct RelevanceVerdict {
    relevant: bool,
}

/// Judges one candidate result against a query and the already-accepted
/// sources
#[derive(Clone)]
pub struct RelevanceEvaluator {
    generator: Arc<dyn TextGenerator>,
    steps: StepRunner,
}

impl RelevanceEvaluator {
    pub fn new(generator: Arc<dyn TextGenerator>, steps: StepRunner) -> Self {
        Self { generator, steps }
    }

    /// Relevance verdict for `candidate`. A URL already present in
    /// `accepted` is irrelevant by rule, regardless of what the model
    /// would say; duplicate suppression must not depend on model
    /// behavior.
    pub async fn evaluate(
        &self,
        query: &str,
        candidate: &SearchResult,
        accepted: &[SearchResult],
    ) -> CoreResult<bool> {
        if accepted.iter().any(|s| s.url == candidate.url) {
            debug!(url = %candidate.url, "Duplicate URL, marking irrelevant");
            return Ok(false);
        }

        let existing_urls: Vec<&str> = accepted.iter().map(|s| s.url.as_str()).collect();
        let prompt = format!(
            "Evaluate whether the search result is relevant and will help \
             answer the following query: {query}. If the page already exists \
             in the existing results, mark it as irrelevant.\n\n\
             <search_result>\n{result}\n</search_result>\n\n\
             <existing_results>\n{existing}\n</existing_results>\n\n\
             Respond with a JSON object {{\"relevant\": true|false}} and nothing else.",
            result = serde_json::to_string(candidate)?,
            existing = serde_json::to_string(&existing_urls)?,
        );

        let generator = self.generator.clone();
        let verdict = self
            .steps
            .run("evaluate-search-result", move || {
                let generator = generator.clone();
                let prompt = prompt.clone();
                Box::pin(async move {
                    let text = generator.generate(None, &prompt).await.map_err(|e| {
                        ResearchError::evaluation(format!("evaluation call failed: {e}"))
                    })?;
                    let json = extract_json_object(&text).ok_or_else(|| {
                        ResearchError::evaluation("no JSON object in relevance response")
                    })?;
                    let verdict: RelevanceVerdict = serde_json::from_str(json).map_err(|e| {
                        ResearchError::evaluation(format!("malformed relevance verdict: {e}"))
                    })?;
                    Ok(verdict.relevant)
                })
            })
            .await?;

        Ok(verdict)
    }
}

/// Distills one accepted search result into a learning plus follow-up
/// questions
#[derive(Clone)]
pub struct LearningExtractor {
    generator: Arc<dyn TextGenerator>,
    steps: StepRunner,
}

impl LearningExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>, steps: StepRunner) -> Self {
        Self { generator, steps }
    }

    /// Extract one learning with up to `breadth` follow-up questions.
    /// Surplus questions are truncated; a shortfall is accepted as-is
    /// (the generator is not contractually bound to the exact count).
    pub async fn extract(
        &self,
        query: &str,
        search_result: &SearchResult,
        breadth: usize,
    ) -> CoreResult<Learning> {
        let prompt = format!(
            "The user is researching \"{query}\". The following search result \
             was deemed relevant. Generate a learning and {breadth} follow-up \
             questions from it.\n\n\
             <search_result>\n{result}\n</search_result>\n\n\
             Respond with a JSON object \
             {{\"learning\": \"...\", \"followUpQuestions\": [\"...\"]}} and nothing else.",
            result = serde_json::to_string(search_result)?,
        );

        let generator = self.generator.clone();
        let mut learning = self
            .steps
            .run("generate-learnings", move || {
                let generator = generator.clone();
                let prompt = prompt.clone();
                Box::pin(async move {
                    let text = generator.generate(None, &prompt).await?;
                    let json = extract_json_object(&text).ok_or_else(|| {
                        ResearchError::generation("no JSON object in learning response")
                    })?;
                    let learning: Learning = serde_json::from_str(json).map_err(|e| {
                        ResearchError::generation(format!("malformed learning: {e}"))
                    })?;
                    Ok(learning)
                })
            })
            .await?;

        learning.follow_up_questions.truncate(breadth);
        Ok(learning)
    }
}

const REPORT_SYSTEM_PROMPT: &str = "\
You are an expert researcher writing for a highly experienced analyst. \
Be as detailed as possible and make sure your response is correct. \
Be highly organized, suggest solutions the reader may not have considered, \
and treat the reader as an expert in all subject matter. \
Value good arguments over authorities. Consider new technologies and \
contrarian ideas, not just the conventional wisdom. You may speculate or \
predict, but flag it. Use Markdown formatting.";

/// Converts the accumulated research state into the final narrative report
#[derive(Clone)]
pub struct ReportSynthesizer {
    generator: Arc<dyn TextGenerator>,
    steps: StepRunner,
}

impl ReportSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, steps: StepRunner) -> Self {
        Self { generator, steps }
    }

    /// Synthesize a narrative report from the full accumulated state.
    /// There is no fallback: a generation failure here fails the run.
    pub async fn synthesize(&self, state: &ResearchState) -> CoreResult<String> {
        info!(
            sources = state.sources.len(),
            learnings = state.learnings.len(),
            "Synthesizing report"
        );

        let prompt = format!(
            "Generate a report based on the following research data:\n{}",
            serde_json::to_string_pretty(state)?,
        );

        let generator = self.generator.clone();
        self.steps
            .run("generate-report", move || {
                let generator = generator.clone();
                let prompt = prompt.clone();
                Box::pin(async move {
                    let report = generator
                        .generate(Some(REPORT_SYSTEM_PROMPT), &prompt)
                        .await?;
                    if report.trim().is_empty() {
                        return Err(ResearchError::generation("empty report"));
                    }
                    Ok(report)
                })
            })
            .await
    }
}

/// The bounded retrieve-and-evaluate controller: alternate retrieval and
/// evaluation for one query until a candidate is accepted or attempts run
/// out.
#[derive(Clone)]
pub struct SearchPipeline {
    searcher: Arc<dyn SearchProvider>,
    evaluator: RelevanceEvaluator,
    steps: StepRunner,
    progress: ProgressLog,
}

impl SearchPipeline {
    pub fn new(
        searcher: Arc<dyn SearchProvider>,
        evaluator: RelevanceEvaluator,
        steps: StepRunner,
        progress: ProgressLog,
    ) -> Self {
        Self {
            searcher,
            evaluator,
            steps,
            progress,
        }
    }

    /// Find the first candidate judged relevant for `query`, or `None`
    /// after [`MAX_SEARCH_ATTEMPTS`] unsuccessful attempts. The query
    /// string never changes across attempts. An empty retrieval or an
    /// irrelevant candidate is a soft miss; a provider call that
    /// exhausts its retry budget propagates and aborts the run.
    pub async fn search_and_process(
        &self,
        query: &str,
        accepted: &[SearchResult],
    ) -> CoreResult<Option<SearchResult>> {
        for attempt in 1..=MAX_SEARCH_ATTEMPTS {
            self.progress
                .emit(ProgressEventKind::SearchingWeb {
                    query: query.to_string(),
                })
                .await;

            let searcher = self.searcher.clone();
            let step_query = query.to_string();
            let candidate = self
                .steps
                .run("search-web", move || {
                    let searcher = searcher.clone();
                    let query = step_query.clone();
                    Box::pin(async move { searcher.search(&query).await })
                })
                .await?;

            let Some(candidate) = candidate else {
                debug!(query, attempt, "No search results, retrying same query");
                continue;
            };

            if self.evaluator.evaluate(query, &candidate, accepted).await? {
                info!(url = %candidate.url, attempt, "Accepted search result");
                return Ok(Some(candidate));
            }

            warn!(url = %candidate.url, attempt, "Irrelevant search result");
        }

        debug!(query, "Search attempts exhausted without a relevant result");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepresearch_core::RetryConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast_steps() -> StepRunner {
        StepRunner::new(RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.8,
            jitter: false,
        })
    }

    /// Generator stub replaying canned responses in order
    struct ScriptedGenerator {
        responses: Mutex<Vec<CoreResult<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<CoreResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _system: Option<&str>, _prompt: &str) -> CoreResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("{}".to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    struct FixedSearcher {
        result: Option<SearchResult>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FixedSearcher {
        async fn search(&self, _query: &str) -> CoreResult<Option<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    fn sample_result(url: &str) -> SearchResult {
        SearchResult::new(Some("Title".to_string()), url, "content", None)
    }

    #[tokio::test]
    async fn query_generator_parses_and_truncates() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"Here you go: ["q1", "q2", "q3"]"#.to_string()
        )]);
        let queries = QueryGenerator::new(generator, fast_steps())
            .generate("topic", 2)
            .await
            .unwrap();
        assert_eq!(queries, vec!["q1".to_string(), "q2".to_string()]);
    }

    #[tokio::test]
    async fn query_generator_rejects_out_of_range_n() {
        let generator = ScriptedGenerator::new(vec![]);
        let result = QueryGenerator::new(generator.clone(), fast_steps())
            .generate("topic", 6)
            .await;
        assert!(matches!(result, Err(ResearchError::Validation(_))));
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn query_generator_retries_malformed_batches() {
        let generator = ScriptedGenerator::new(vec![
            Ok("not json at all".to_string()),
            Ok(r#"["only one works"]"#.to_string()),
        ]);
        let queries = QueryGenerator::new(generator.clone(), fast_steps())
            .generate("topic", 1)
            .await
            .unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn evaluator_rejects_duplicate_url_without_calling_generator() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"{"relevant": true}"#.to_string())]);
        let evaluator = RelevanceEvaluator::new(generator.clone(), fast_steps());

        let candidate = sample_result("https://dup.example.com");
        let accepted = vec![sample_result("https://dup.example.com")];

        let relevant = evaluator
            .evaluate("query", &candidate, &accepted)
            .await
            .unwrap();
        assert!(!relevant);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn evaluator_accepts_new_url_when_model_says_relevant() {
        let generator = ScriptedGenerator::new(vec![Ok(r#"{"relevant": true}"#.to_string())]);
        let evaluator = RelevanceEvaluator::new(generator, fast_steps());

        let candidate = sample_result("https://new.example.com");
        let accepted = vec![sample_result("https://other.example.com")];

        assert!(evaluator
            .evaluate("query", &candidate, &accepted)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn learning_extractor_truncates_surplus_follow_ups() {
        let generator = ScriptedGenerator::new(vec![Ok(
            r#"{"learning": "L", "followUpQuestions": ["a", "b", "c", "d"]}"#.to_string(),
        )]);
        let learning = LearningExtractor::new(generator, fast_steps())
            .extract("query", &sample_result("https://x.example.com"), 2)
            .await
            .unwrap();
        assert_eq!(learning.text, "L");
        assert_eq!(learning.follow_up_questions.len(), 2);
    }

    #[tokio::test]
    async fn loop_returns_none_after_three_empty_retrievals() {
        let searcher = Arc::new(FixedSearcher {
            result: None,
            calls: AtomicUsize::new(0),
        });
        let generator = ScriptedGenerator::new(vec![]);
        let pipeline = SearchPipeline::new(
            searcher.clone(),
            RelevanceEvaluator::new(generator.clone(), fast_steps()),
            fast_steps(),
            ProgressLog::new(),
        );

        let result = pipeline.search_and_process("query", &[]).await.unwrap();
        assert!(result.is_none());
        assert_eq!(searcher.calls.load(Ordering::SeqCst), MAX_SEARCH_ATTEMPTS);
        // No candidate ever retrieved, so the evaluator never ran
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn loop_short_circuits_on_first_relevant_candidate() {
        let searcher = Arc::new(FixedSearcher {
            result: Some(sample_result("https://hit.example.com")),
            calls: AtomicUsize::new(0),
        });
        let generator = ScriptedGenerator::new(vec![Ok(r#"{"relevant": true}"#.to_string())]);
        let pipeline = SearchPipeline::new(
            searcher.clone(),
            RelevanceEvaluator::new(generator, fast_steps()),
            fast_steps(),
            ProgressLog::new(),
        );

        let result = pipeline.search_and_process("query", &[]).await.unwrap();
        assert_eq!(result.unwrap().url, "https://hit.example.com");
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn loop_exhausts_attempts_on_irrelevant_candidates() {
        let searcher = Arc::new(FixedSearcher {
            result: Some(sample_result("https://miss.example.com")),
            calls: AtomicUsize::new(0),
        });
        let generator = ScriptedGenerator::new(vec![
            Ok(r#"{"relevant": false}"#.to_string()),
            Ok(r#"{"relevant": false}"#.to_string()),
            Ok(r#"{"relevant": false}"#.to_string()),
        ]);
        let pipeline = SearchPipeline::new(
            searcher.clone(),
            RelevanceEvaluator::new(generator, fast_steps()),
            fast_steps(),
            ProgressLog::new(),
        );

        let result = pipeline.search_and_process("query", &[]).await.unwrap();
        assert!(result.is_none());
        assert_eq!(searcher.calls.load(Ordering::SeqCst), MAX_SEARCH_ATTEMPTS);
    }

    #[tokio::test]
    async fn loop_emits_searching_web_per_attempt() {
        let searcher = Arc::new(FixedSearcher {
            result: None,
            calls: AtomicUsize::new(0),
        });
        let progress = ProgressLog::new();
        let generator = ScriptedGenerator::new(vec![]);
        let pipeline = SearchPipeline::new(
            searcher,
            RelevanceEvaluator::new(generator, fast_steps()),
            fast_steps(),
            progress.clone(),
        );

        pipeline.search_and_process("query", &[]).await.unwrap();

        let events = progress.snapshot().await;
        assert_eq!(events.len(), MAX_SEARCH_ATTEMPTS);
        assert!(events
            .iter()
            .all(|e| matches!(e.kind, ProgressEventKind::SearchingWeb { .. })));
    }
}
