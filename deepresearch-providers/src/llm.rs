//! LLM generation via siumai
//!
//! One unified client over multiple providers; the engine only sees the
//! `TextGenerator` seam.

use deepresearch_core::{async_trait, CoreResult, LlmConfig, ResearchError, TextGenerator};
use siumai::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Unified text generator backed by a siumai client
pub struct LlmGenerator {
    client: Box<dyn LlmClient>,
    config: LlmConfig,
}

impl LlmGenerator {
    /// Create a new generator for the configured provider
    pub async fn new(config: LlmConfig) -> CoreResult<Self> {
        let client = Self::build_client(&config).await?;

        info!(
            provider = %config.provider,
            model = %config.model,
            "Created LLM generator"
        );

        Ok(Self { client, config })
    }

    /// Build the appropriate siumai client based on configuration
    async fn build_client(config: &LlmConfig) -> CoreResult<Box<dyn LlmClient>> {
        match config.provider.as_str() {
            "openai" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| ResearchError::config("OpenAI API key not found"))?;

                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens as u32);
                }

                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder.build().await.map_err(|e| {
                    ResearchError::config(format!("Failed to build OpenAI client: {e}"))
                })?;

                Ok(Box::new(client))
            }
            "anthropic" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                    .ok_or_else(|| ResearchError::config("Anthropic API key not found"))?;

                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens as u32);
                }

                let client = builder.build().await.map_err(|e| {
                    ResearchError::config(format!("Failed to build Anthropic client: {e}"))
                })?;

                Ok(Box::new(client))
            }
            "ollama" => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(&config.model)
                    .base_url(&base_url)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens as u32);
                }

                let client = builder.build().await.map_err(|e| {
                    ResearchError::config(format!("Failed to build Ollama client: {e}"))
                })?;

                Ok(Box::new(client))
            }
            "groq" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("GROQ_API_KEY").ok())
                    .ok_or_else(|| ResearchError::config("Groq API key not found"))?;

                let mut builder = LlmBuilder::new()
                    .groq()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens as u32);
                }

                let client = builder.build().await.map_err(|e| {
                    ResearchError::config(format!("Failed to build Groq client: {e}"))
                })?;

                Ok(Box::new(client))
            }
            provider => Err(ResearchError::config(format!(
                "Unsupported LLM provider: {provider}"
            ))),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, system: Option<&str>, prompt: &str) -> CoreResult<String> {
        let start_time = Instant::now();

        let messages = match system {
            Some(system_prompt) => vec![system!(system_prompt), user!(prompt)],
            None => vec![user!(prompt)],
        };

        let response = self
            .client
            .chat(messages)
            .await
            .map_err(|e| ResearchError::generation(format!("LLM generation failed: {e}")))?;

        if let Some(content) = response.content_text() {
            debug!(
                duration_ms = start_time.elapsed().as_millis() as u64,
                chars = content.len(),
                "Generated response"
            );
            Ok(content.to_string())
        } else {
            Err(ResearchError::generation(
                "No text content in LLM response",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_is_a_config_error() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        let result = LlmGenerator::new(config).await;
        assert!(matches!(result, Err(ResearchError::Config(_))));
    }
}
