//! Production provider adapters for the deep research engine
//!
//! Implements the core trait seams against real services: siumai for LLM
//! generation, the Exa search API for web retrieval, and the Resend API
//! for report delivery.

pub mod email;
pub mod llm;
pub mod search;

pub use email::ResendClient;
pub use llm::LlmGenerator;
pub use search::ExaSearchClient;
