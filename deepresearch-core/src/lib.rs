//! Deep Research Core - shared foundation for the research engine
//!
//! This crate defines the error taxonomy, configuration, logging setup,
//! retry utilities and the provider trait seams used by every other crate
//! in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use retry::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
