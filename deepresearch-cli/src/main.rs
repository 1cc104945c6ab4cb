//! Deep Research CLI
//!
//! Runs one end-to-end research job from the command line, streaming
//! progress events to the terminal as they happen.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deepresearch_core::{
    async_trait, init_logging, CoreResult, LoggingConfig, ReportDelivery, ResearchSettings,
};
use deepresearch_engine::{ProgressEventKind, ResearchEngine, ResearchRequest};
use deepresearch_providers::{ExaSearchClient, LlmGenerator, ResendClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "deepresearch")]
#[command(about = "Automated iterative research: expand, retrieve, distill, report")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a research job and email the report
    Research {
        /// The research prompt
        prompt: String,

        /// Report recipient; repeat for multiple addresses
        #[arg(long = "to")]
        recipients: Vec<String>,

        /// Recursion depth
        #[arg(long)]
        depth: Option<usize>,

        /// Sub-queries per expansion level (1-5)
        #[arg(long)]
        breadth: Option<usize>,

        /// Override the configured LLM model
        #[arg(short, long, env = "DEEPRESEARCH_LLM_MODEL")]
        model: Option<String>,

        /// Skip email dispatch and print the report to stdout
        #[arg(long)]
        dry_run: bool,
    },
}

/// Delivery stand-in for --dry-run: confirms the dispatch step without
/// talking to any provider.
struct DryRunDelivery;

#[async_trait]
impl ReportDelivery for DryRunDelivery {
    async fn send(
        &self,
        _from: &str,
        to: &[String],
        subject: &str,
        _html_body: &str,
    ) -> CoreResult<()> {
        info!(recipients = to.len(), subject, "Dry run: skipping delivery");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env for local development before anything reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: if cli.verbose { "debug" } else { "info" }.to_string(),
        ..Default::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let mut settings = match &cli.config {
        Some(path) => ResearchSettings::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ResearchSettings::from_env(),
    };

    match cli.command {
        Commands::Research {
            prompt,
            mut recipients,
            depth,
            breadth,
            model,
            dry_run,
        } => {
            if let Some(model) = model {
                settings.llm.model = model;
            }
            settings.validate().context("Invalid configuration")?;

            if recipients.is_empty() {
                if dry_run {
                    recipients.push("dry-run@localhost".to_string());
                } else {
                    anyhow::bail!("at least one --to recipient is required (or use --dry-run)");
                }
            }

            let request = ResearchRequest::new(prompt, recipients)
                .with_depth(depth.unwrap_or(settings.run.depth))
                .with_breadth(breadth.unwrap_or(settings.run.breadth));

            let generator = Arc::new(
                LlmGenerator::new(settings.llm.clone())
                    .await
                    .context("Failed to build LLM client")?,
            );
            let searcher = Arc::new(
                ExaSearchClient::new(settings.search.clone())
                    .context("Failed to build search client")?,
            );
            let delivery: Arc<dyn ReportDelivery> = if dry_run {
                Arc::new(DryRunDelivery)
            } else {
                Arc::new(
                    ResendClient::new(settings.email.clone())
                        .context("Failed to build delivery client")?,
                )
            };

            let engine = ResearchEngine::new(generator, searcher, delivery, &settings);

            // Stream progress events to the terminal while the run executes
            let mut events = engine.progress().subscribe();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    print_event(&event.kind);
                    if event.kind.is_terminal() {
                        break;
                    }
                }
            });

            match engine.run(&request).await {
                Ok(report) => {
                    printer.await.ok();
                    if dry_run {
                        println!("\n{}\n", "=".repeat(60));
                        println!("{report}");
                        println!("{}", "=".repeat(60));
                    }
                    info!("Research run completed");
                    Ok(())
                }
                Err(e) => {
                    printer.abort();
                    error!(error = %e, "Research run failed");
                    Err(e.into())
                }
            }
        }
    }
}

fn print_event(kind: &ProgressEventKind) {
    match kind {
        ProgressEventKind::SearchingWeb { query } => {
            println!("  searching: {query}");
        }
        ProgressEventKind::SearchResults { title, url, .. } => {
            println!("  accepted:  {} ({url})", title.as_deref().unwrap_or("untitled"));
        }
        ProgressEventKind::Learning { text } => {
            println!("  learned:   {text}");
        }
        ProgressEventKind::ResearchCompleted => {
            println!("research completed");
        }
        ProgressEventKind::StartingReportGeneration => {
            println!("generating report...");
        }
        ProgressEventKind::ReportGenerated => {
            println!("report generated");
        }
        ProgressEventKind::SendingReport => {
            println!("sending report...");
        }
        ProgressEventKind::ReportSent => {
            println!("report sent");
        }
    }
}
