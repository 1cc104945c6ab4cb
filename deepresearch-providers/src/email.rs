//! Report delivery via the Resend email API

use deepresearch_core::{async_trait, CoreResult, EmailConfig, ReportDelivery, ResearchError};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: String,
}

/// Resend-backed implementation of the delivery seam
pub struct ResendClient {
    http: reqwest::Client,
    config: EmailConfig,
    api_key: String,
}

impl ResendClient {
    pub fn new(config: EmailConfig) -> CoreResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ResearchError::config("Resend API key not found"))?;

        Ok(Self {
            http: reqwest::Client::new(),
            config,
            api_key,
        })
    }
}

#[async_trait]
impl ReportDelivery for ResendClient {
    async fn send(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        html_body: &str,
    ) -> CoreResult<()> {
        let body = SendEmailBody {
            from,
            to,
            subject,
            html: html_body,
        };

        let response = self
            .http
            .post(format!("{}/emails", self.config.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::delivery(format!("delivery request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<ResendErrorBody>().await {
                Ok(error_body) => error_body.message,
                Err(_) => format!("delivery provider returned {status}"),
            };
            return Err(ResearchError::delivery(message));
        }

        info!(recipients = to.len(), subject, "Report delivered");
        Ok(())
    }
}
