//! Deep Research Engine
//!
//! The recursive research orchestration core: given a prompt, the engine
//! expands it into sub-queries (bounded by depth and breadth), retrieves
//! and relevance-filters web evidence, distills each accepted source into
//! a learning, recurses on follow-up questions, then synthesizes and
//! dispatches a final report. Progress is published as an append-only,
//! time-ordered event sequence observable while the run is in flight.

pub mod dispatch;
pub mod engine;
pub mod pipeline;
pub mod progress;
pub mod types;

pub use dispatch::ReportDispatcher;
pub use engine::ResearchEngine;
pub use pipeline::{
    LearningExtractor, QueryGenerator, RelevanceEvaluator, ReportSynthesizer, SearchPipeline,
    MAX_SEARCH_ATTEMPTS,
};
pub use progress::ProgressLog;
pub use types::{ProgressEvent, ProgressEventKind, ResearchRequest, ResearchState};
