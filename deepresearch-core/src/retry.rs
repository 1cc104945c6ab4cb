//! Retry utilities and the step runner
//!
//! Every atomic external call (generation, retrieval, evaluation,
//! delivery) runs through [`StepRunner::run`], which applies one uniform
//! retry policy. Exhausting the budget here is a hard failure for the
//! whole run; soft-miss handling lives above this layer, in the
//! search-and-process loop.

use crate::error::CoreResult;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, warn};

/// Retry configuration applied uniformly by the step runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included)
    pub max_attempts: usize,
    /// Initial delay between attempts in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays. Off by default: a run is a single
    /// logical client and a deterministic schedule keeps test timing
    /// reproducible.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 1.8,
            jitter: false,
        }
    }
}

/// Retry an async operation with exponential backoff
pub async fn retry_async<F, T>(
    operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> CoreResult<T>
where
    F: Fn() -> BoxFuture<'static, CoreResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= config.max_attempts {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed after all retry attempts"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay,
                    "Operation failed, retrying"
                );

                let actual_delay = if config.jitter {
                    let jitter_factor = 0.1;
                    let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
                    ((delay as f64) * (1.0 + jitter)) as u64
                } else {
                    delay
                };

                sleep(Duration::from_millis(actual_delay)).await;

                delay = ((delay as f64) * config.backoff_multiplier) as u64;
                delay = delay.min(config.max_delay_ms);
            }
        }
    }
}

/// In-process stand-in for a durable step executor: runs a named step and
/// waits for its result, applying the shared retry policy. The durability
/// substrate behind it is pluggable; the engine only relies on the
/// "run step and wait" shape.
#[derive(Debug, Clone, Default)]
pub struct StepRunner {
    config: RetryConfig,
}

impl StepRunner {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run one atomic external-call step to completion or hard failure.
    pub async fn run<F, T>(&self, step_name: &str, operation: F) -> CoreResult<T>
    where
        F: Fn() -> BoxFuture<'static, CoreResult<T>>,
    {
        retry_async(operation, &self.config, step_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResearchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_config() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 1.8,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn succeeds_first_attempt() {
        let runner = StepRunner::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = runner
            .run("test-step", move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42usize)
                })
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let runner = StepRunner::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result = runner
            .run("flaky-step", move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ResearchError::retrieval("transient"))
                    } else {
                        Ok("ok")
                    }
                })
            })
            .await
            .unwrap();

        assert_eq!(result, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_fails_hard() {
        let runner = StepRunner::new(fast_config());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        let result: CoreResult<()> = runner
            .run("dead-step", move || {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ResearchError::generation("always fails"))
                })
            })
            .await;

        assert!(matches!(result, Err(ResearchError::Generation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
