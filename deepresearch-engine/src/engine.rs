//! The recursive research orchestration engine
//!
//! `expand` drives the bounded depth/breadth recursion over the shared
//! accumulator; `run` wraps one full research job from prompt to
//! dispatched report, publishing progress events at every externally
//! meaningful transition.

use crate::dispatch::ReportDispatcher;
use crate::pipeline::{
    LearningExtractor, QueryGenerator, RelevanceEvaluator, ReportSynthesizer, SearchPipeline,
};
use crate::progress::ProgressLog;
use crate::types::{ProgressEventKind, ResearchRequest, ResearchState};
use deepresearch_core::{
    CoreResult, ReportDelivery, ResearchSettings, SearchProvider, StepRunner, TextGenerator,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, info};

/// One engine drives one research run. All external collaborators come in
/// behind trait objects, so production providers and test stubs wire up
/// identically.
pub struct ResearchEngine {
    query_generator: QueryGenerator,
    search_pipeline: SearchPipeline,
    learning_extractor: LearningExtractor,
    report_synthesizer: ReportSynthesizer,
    dispatcher: ReportDispatcher,
    progress: ProgressLog,
}

impl ResearchEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        searcher: Arc<dyn SearchProvider>,
        delivery: Arc<dyn ReportDelivery>,
        settings: &ResearchSettings,
    ) -> Self {
        let steps = StepRunner::new(settings.retry.clone());
        let progress = ProgressLog::new();

        Self {
            query_generator: QueryGenerator::new(generator.clone(), steps.clone()),
            search_pipeline: SearchPipeline::new(
                searcher,
                RelevanceEvaluator::new(generator.clone(), steps.clone()),
                steps.clone(),
                progress.clone(),
            ),
            learning_extractor: LearningExtractor::new(generator.clone(), steps.clone()),
            report_synthesizer: ReportSynthesizer::new(generator, steps.clone()),
            dispatcher: ReportDispatcher::new(delivery, steps, settings.email.clone()),
            progress,
        }
    }

    /// Handle to this run's progress timeline
    pub fn progress(&self) -> ProgressLog {
        self.progress.clone()
    }

    /// Execute one end-to-end run: expansion, synthesis, dispatch.
    /// Returns the report text on success. On failure the progress
    /// timeline keeps everything appended so far as a partial trace.
    pub async fn run(&self, request: &ResearchRequest) -> CoreResult<String> {
        request.validate()?;

        info!(
            run_id = %self.progress.run_id(),
            prompt = %request.prompt,
            depth = request.depth,
            breadth = request.breadth,
            "Starting research run"
        );

        let mut state = ResearchState::new();
        self.expand(
            &mut state,
            request.prompt.clone(),
            request.depth,
            request.breadth,
        )
        .await?;

        info!(
            sources = state.sources.len(),
            learnings = state.learnings.len(),
            "Research completed"
        );
        self.progress.emit(ProgressEventKind::ResearchCompleted).await;

        self.progress
            .emit(ProgressEventKind::StartingReportGeneration)
            .await;
        let report = self.report_synthesizer.synthesize(&state).await?;
        self.progress.emit(ProgressEventKind::ReportGenerated).await;

        self.progress.emit(ProgressEventKind::SendingReport).await;
        self.dispatcher
            .dispatch(&request.prompt, &report, &request.recipients)
            .await?;
        self.progress.emit(ProgressEventKind::ReportSent).await;

        info!(run_id = %self.progress.run_id(), "Research run finished");
        Ok(report)
    }

    /// Recursive expansion over the shared accumulator. Depth is the sole
    /// terminal condition; breadth halves (ceiling) each level so the
    /// fan-out decays while follow-up threads still get explored.
    /// Sub-queries are processed strictly in sequence: evaluation
    /// correctness depends on seeing all previously accepted sources.
    fn expand<'a>(
        &'a self,
        state: &'a mut ResearchState,
        prompt: String,
        depth: usize,
        breadth: usize,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(async move {
            if state.root_query.is_none() {
                state.root_query = Some(prompt.clone());
            }

            if depth == 0 {
                debug!("Depth exhausted, terminating branch");
                return Ok(());
            }

            let queries = self.query_generator.generate(&prompt, breadth).await?;
            state.queries = queries.clone();

            for query in queries {
                let accepted = self
                    .search_pipeline
                    .search_and_process(&query, &state.sources)
                    .await?;

                // Exhausted attempts: skip this branch, siblings proceed
                let Some(source) = accepted else {
                    debug!(query = %query, "No relevant result, skipping branch");
                    continue;
                };

                self.progress
                    .emit(ProgressEventKind::SearchResults {
                        title: source.title.clone(),
                        url: source.url.clone(),
                        favicon_url: source.favicon_url.clone(),
                    })
                    .await;
                state.sources.push(source.clone());

                let learning = self
                    .learning_extractor
                    .extract(&query, &source, breadth)
                    .await?;
                self.progress
                    .emit(ProgressEventKind::Learning {
                        text: learning.text.clone(),
                    })
                    .await;

                state.completed_queries.push(query.clone());

                let goal = state
                    .root_query
                    .clone()
                    .unwrap_or_else(|| prompt.clone());
                let next_prompt = format!(
                    "Overall research goal: {goal}\n\
                     Previous search queries: {completed}\n\n\
                     Follow-up questions: {follow_ups}",
                    completed = state.completed_queries.join(", "),
                    follow_ups = learning.follow_up_questions.join(", "),
                );
                state.learnings.push(learning);

                self.expand(state, next_prompt, depth - 1, breadth.div_ceil(2))
                    .await?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepresearch_core::{ResearchError, SearchResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct PanickingGenerator;

    #[async_trait]
    impl deepresearch_core::TextGenerator for PanickingGenerator {
        async fn generate(&self, _system: Option<&str>, _prompt: &str) -> CoreResult<String> {
            panic!("generator must not be called at depth 0");
        }
    }

    struct CountingSearcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl deepresearch_core::SearchProvider for CountingSearcher {
        async fn search(&self, _query: &str) -> CoreResult<Option<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    struct NoopDelivery;

    #[async_trait]
    impl deepresearch_core::ReportDelivery for NoopDelivery {
        async fn send(
            &self,
            _from: &str,
            _to: &[String],
            _subject: &str,
            _html_body: &str,
        ) -> CoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn depth_zero_sets_root_query_and_makes_no_calls() {
        let searcher = Arc::new(CountingSearcher {
            calls: AtomicUsize::new(0),
        });
        let engine = ResearchEngine::new(
            Arc::new(PanickingGenerator),
            searcher.clone(),
            Arc::new(NoopDelivery),
            &ResearchSettings::default(),
        );

        let mut state = ResearchState::new();
        engine
            .expand(&mut state, "the prompt".to_string(), 0, 3)
            .await
            .unwrap();

        assert_eq!(state.root_query.as_deref(), Some("the prompt"));
        assert!(state.queries.is_empty());
        assert!(state.sources.is_empty());
        assert!(state.learnings.is_empty());
        assert!(state.completed_queries.is_empty());
        assert_eq!(searcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn root_query_is_never_overwritten() {
        let engine = ResearchEngine::new(
            Arc::new(PanickingGenerator),
            Arc::new(CountingSearcher {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(NoopDelivery),
            &ResearchSettings::default(),
        );

        let mut state = ResearchState::new();
        state.root_query = Some("original goal".to_string());
        engine
            .expand(&mut state, "a follow-up prompt".to_string(), 0, 2)
            .await
            .unwrap();

        assert_eq!(state.root_query.as_deref(), Some("original goal"));
    }

    #[tokio::test]
    async fn run_rejects_invalid_requests_before_any_event() {
        let engine = ResearchEngine::new(
            Arc::new(PanickingGenerator),
            Arc::new(CountingSearcher {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(NoopDelivery),
            &ResearchSettings::default(),
        );

        let request = ResearchRequest::new("topic", vec![]);
        let result = engine.run(&request).await;
        assert!(matches!(result, Err(ResearchError::Validation(_))));
        assert!(engine.progress().is_empty().await);
    }
}
