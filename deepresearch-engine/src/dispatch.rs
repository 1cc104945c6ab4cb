//! Report dispatch
//!
//! Hands the synthesized report to the delivery provider, addressed to
//! all recipients in one send. A provider error is fatal to the run: the
//! report exists but is not confirmed delivered.

use deepresearch_core::{CoreResult, EmailConfig, ReportDelivery, StepRunner};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ReportDispatcher {
    delivery: Arc<dyn ReportDelivery>,
    steps: StepRunner,
    config: EmailConfig,
}

impl ReportDispatcher {
    pub fn new(delivery: Arc<dyn ReportDelivery>, steps: StepRunner, config: EmailConfig) -> Self {
        Self {
            delivery,
            steps,
            config,
        }
    }

    /// Send the report to every recipient in a single delivery call.
    pub async fn dispatch(
        &self,
        query: &str,
        report: &str,
        recipients: &[String],
    ) -> CoreResult<()> {
        let subject = format!("Deep Research Report for {query}");
        let html_body = render_report_html(report);

        info!(
            recipients = recipients.len(),
            subject = %subject,
            "Dispatching report"
        );

        let delivery = self.delivery.clone();
        let from = self.config.from.clone();
        let to = recipients.to_vec();
        self.steps
            .run("send-report", move || {
                let delivery = delivery.clone();
                let from = from.clone();
                let to = to.clone();
                let subject = subject.clone();
                let html_body = html_body.clone();
                Box::pin(async move { delivery.send(&from, &to, &subject, &html_body).await })
            })
            .await
    }
}

/// Minimal HTML rendering of the Markdown report: escaped text inside a
/// preformatted block, so the report survives any mail client.
fn render_report_html(report: &str) -> String {
    let escaped = report
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<html><body><pre style=\"font-family: sans-serif; white-space: pre-wrap;\">{escaped}</pre></body></html>"
    )
}
