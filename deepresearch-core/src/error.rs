//! Unified error handling for the research pipeline
//!
//! Each variant corresponds to one class of external collaborator failure.
//! A variant surfacing out of a run means the retry budget for that call
//! was already exhausted; the run ends with whatever progress trace was
//! accumulated so far.

use thiserror::Error;

pub type CoreResult<T> = Result<T, ResearchError>;

/// Main error type for the deep research system
#[derive(Error, Debug)]
pub enum ResearchError {
    /// The text generator could not produce usable output (query
    /// generation, learning extraction or report synthesis).
    #[error("Generation error: {0}")]
    Generation(String),

    /// The web search provider failed (zero results is not a failure).
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The relevance evaluation call failed (the verdict itself never
    /// fails, only the call).
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// The email delivery provider reported an error.
    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResearchError {
    /// Create a generation error
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation(message.into())
    }

    /// Create a retrieval error
    pub fn retrieval<S: Into<String>>(message: S) -> Self {
        Self::Retrieval(message.into())
    }

    /// Create an evaluation error
    pub fn evaluation<S: Into<String>>(message: S) -> Self {
        Self::Evaluation(message.into())
    }

    /// Create a delivery error
    pub fn delivery<S: Into<String>>(message: S) -> Self {
        Self::Delivery(message.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }
}
