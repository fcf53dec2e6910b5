//! Ingest command

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use lotledger_core::{AppConfig, BatchSink};
use lotledger_infra::{
    FileCheckpointStore, InMemorySink, PostgresSink, PostgresSinkConfig, TimeoutPolicy,
};
use lotledger_ingestion::{
    AuctionMetadataRegistry, DirectoryDocumentSource, DriverOptions, IngestionDriver,
    LineItemPipeline, RunSummary,
};

use crate::output::{self, ConsoleReporter};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Directory of invoice text documents, one file per invoice
    #[arg(short, long)]
    pub documents: PathBuf,

    /// Auction metadata CSV
    #[arg(short, long)]
    pub metadata: PathBuf,

    /// Checkpoint file recording fully ingested invoices
    #[arg(short, long, default_value = "ingestion_checkpoint.json")]
    pub checkpoint: PathBuf,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Extract and classify only; persist nothing and leave the checkpoint untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore the checkpoint and reprocess every document
    #[arg(long)]
    pub force: bool,

    /// Documents processed concurrently
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Flush the checkpoint every N succeeded documents
    #[arg(long)]
    pub flush_every: Option<usize>,

    /// Buyer's premium percent for invoices without metadata
    #[arg(long)]
    pub default_premium: Option<String>,

    /// Sales tax percent for invoices without metadata
    #[arg(long)]
    pub default_tax: Option<String>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

pub async fn run(args: IngestArgs, mut config: AppConfig) -> Result<RunSummary> {
    if args.default_premium.is_some() || args.default_tax.is_some() {
        let premium = args
            .default_premium
            .clone()
            .unwrap_or_else(|| config.ingestion.default_premium_percent.clone());
        let tax = args
            .default_tax
            .clone()
            .unwrap_or_else(|| config.ingestion.default_tax_percent.clone());
        config.ingestion = config.ingestion.with_default_rates(premium, tax);
    }
    if let Some(parallelism) = args.parallelism {
        config.ingestion = config.ingestion.with_parallelism(parallelism);
    }
    if let Some(flush_every) = args.flush_every {
        config.ingestion = config.ingestion.with_flush_interval(flush_every);
    }
    if let Some(url) = &args.database_url {
        config.database.url = Some(url.clone());
    }

    let defaults = config
        .ingestion
        .financial_defaults()
        .context("Invalid default premium or tax")?;

    let metadata = AuctionMetadataRegistry::load(&args.metadata, defaults)
        .await
        .context("Failed to load auction metadata")?;

    let source = DirectoryDocumentSource::new(&args.documents)
        .with_extensions(&config.ingestion.document_extensions);

    let timeouts = TimeoutPolicy::from_config(&config.timeouts);
    let sink = open_sink(&config, args.dry_run).await?;

    let pipeline = LineItemPipeline::new().with_max_keywords(config.ingestion.max_keywords);

    let options = DriverOptions::from_config(&config.ingestion)
        .with_dry_run(args.dry_run)
        .with_force(args.force);

    let driver = IngestionDriver::new(
        Arc::new(source),
        Arc::new(metadata),
        sink,
        Arc::new(FileCheckpointStore::new(&args.checkpoint)),
    )
    .with_pipeline(Arc::new(pipeline))
    .with_options(options)
    .with_timeouts(timeouts)
    .with_reporter(Arc::new(ConsoleReporter::new()));

    cancel_on_ctrl_c(driver.cancellation_token());

    let summary = driver.run().await?;

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        output::info(&format!("Summary written to {}", path.display()));
    }

    Ok(summary)
}

async fn open_sink(config: &AppConfig, dry_run: bool) -> Result<Arc<dyn BatchSink>> {
    if dry_run {
        return Ok(Arc::new(InMemorySink::new()));
    }

    if config.database.url.is_none() {
        bail!("A database URL is required unless --dry-run is set (--database-url, DATABASE_URL or LOTLEDGER__DATABASE__URL)");
    }

    let sink_config = PostgresSinkConfig::from_database_config(&config.database, config.timeouts.connect())?;
    let sink = PostgresSink::connect(sink_config)
        .await
        .context("Cannot connect to the database")?;
    sink.ensure_schema()
        .await
        .context("Failed to prepare the line item table")?;

    Ok(Arc::new(sink))
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current documents");
            output::warning("Interrupt received, stopping after the current documents");
            token.cancel();
        }
    });
}
