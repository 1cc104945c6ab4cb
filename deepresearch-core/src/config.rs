//! Configuration management
//!
//! Settings are loaded from an optional TOML file, then overridden by
//! environment variables for the secrets (API keys) that should never
//! live in a checked-in file.

use crate::error::{CoreResult, ResearchError};
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai", "anthropic", "ollama" or "groq"
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// API key (falls back to the provider's conventional env var)
    pub api_key: Option<String>,
    /// Custom base URL (required for ollama, optional elsewhere)
    pub base_url: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per response
    pub max_tokens: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4.1".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: Some(4000),
        }
    }
}

/// Web search provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// API key (falls back to EXA_API_KEY)
    pub api_key: Option<String>,
    /// Search API endpoint
    pub base_url: String,
    /// Results requested per query; the engine only ever consumes the
    /// single best-ranked hit
    pub num_results: usize,
    /// Request a fresh crawl of the page content on every search
    pub livecrawl: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.exa.ai".to_string(),
            num_results: 1,
            livecrawl: true,
        }
    }
}

/// Email delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// API key (falls back to RESEND_API_KEY)
    pub api_key: Option<String>,
    /// Delivery API endpoint
    pub base_url: String,
    /// Sender address for research reports
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.resend.com".to_string(),
            from: "Deep Research <reports@deepresearch.local>".to_string(),
        }
    }
}

/// Default run parameters applied when a request leaves them unset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    /// Recursion depth (hard termination bound)
    pub depth: usize,
    /// Sub-queries per expansion level, 1 to 5
    pub breadth: usize,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            depth: 2,
            breadth: 3,
        }
    }
}

/// Top-level settings for the research system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub email: EmailConfig,
    pub run: RunDefaults,
    pub retry: RetryConfig,
}

impl ResearchSettings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut settings: ResearchSettings = toml::from_str(&content)
            .map_err(|e| ResearchError::config(format!("Failed to parse config file: {e}")))?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Build settings from defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Pull secrets and provider selection from the environment
    fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("DEEPRESEARCH_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("DEEPRESEARCH_LLM_MODEL") {
            self.llm.model = model;
        }
        if self.search.api_key.is_none() {
            self.search.api_key = std::env::var("EXA_API_KEY").ok();
        }
        if self.email.api_key.is_none() {
            self.email.api_key = std::env::var("RESEND_API_KEY").ok();
        }
    }

    /// Validate settings before a run starts
    pub fn validate(&self) -> CoreResult<()> {
        if !(1..=5).contains(&self.run.breadth) {
            return Err(ResearchError::validation(format!(
                "breadth must be between 1 and 5, got {}",
                self.run.breadth
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ResearchError::validation(
                "retry.max_attempts must be at least 1",
            ));
        }
        if self.email.from.is_empty() {
            return Err(ResearchError::validation("email.from must not be empty"));
        }
        match self.llm.provider.as_str() {
            "openai" | "anthropic" | "ollama" | "groq" => Ok(()),
            provider => Err(ResearchError::config(format!(
                "Unsupported LLM provider: {provider}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ResearchSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.run.depth, 2);
        assert_eq!(settings.run.breadth, 3);
        assert_eq!(settings.retry.max_attempts, 3);
    }

    #[test]
    fn breadth_out_of_range_is_rejected() {
        let mut settings = ResearchSettings::default();
        settings.run.breadth = 0;
        assert!(matches!(
            settings.validate(),
            Err(ResearchError::Validation(_))
        ));

        settings.run.breadth = 6;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut settings = ResearchSettings::default();
        settings.llm.provider = "clippy".to_string();
        assert!(matches!(settings.validate(), Err(ResearchError::Config(_))));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml = r#"
            [run]
            depth = 1
            breadth = 2

            [llm]
            provider = "ollama"
            model = "llama3.2"
            base_url = "http://localhost:11434"
            temperature = 0.2
        "#;
        let settings: ResearchSettings = toml::from_str(toml).unwrap();
        assert_eq!(settings.run.depth, 1);
        assert_eq!(settings.llm.provider, "ollama");
        // Sections absent from the file fall back to defaults
        assert_eq!(settings.search.num_results, 1);
        assert!(settings.validate().is_ok());
    }
}
