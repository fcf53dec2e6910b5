//! Inspect command: show how one document is reconstructed and classified

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tabled::{Table, Tabled};

use lotledger_core::AppConfig;
use lotledger_ingestion::{AuctionMetadataRegistry, ExtractorRegistry, LineItemPipeline};

use crate::output;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Invoice text document
    pub file: PathBuf,

    /// Auction metadata CSV used for premium and tax
    #[arg(short, long)]
    pub metadata: Option<PathBuf>,

    /// Print items as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "#")]
    ordinal: usize,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Bid")]
    bid: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Condition")]
    condition: String,
    #[tabled(rename = "Total")]
    total: String,
}

pub async fn run(args: InspectArgs, config: AppConfig) -> Result<()> {
    let content = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Cannot read {}", args.file.display()))?;

    let filename = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let document_id = args
        .file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let mut extractors = ExtractorRegistry::with_defaults();
    if extractors.get_by_filename(&filename).is_err() {
        // Any other extension is treated as plain text here
        let extension = args.file.extension().and_then(|e| e.to_str()).unwrap_or_default();
        extractors.alias(extension, "txt");
    }
    let extracted = extractors
        .get_by_filename(&filename)?
        .extract(&content, Some(&filename))
        .await?;
    let lines = extracted.lines();

    let defaults = config.ingestion.financial_defaults()?;
    let registry = match &args.metadata {
        Some(path) => AuctionMetadataRegistry::load(path, defaults).await?,
        None => AuctionMetadataRegistry::new(defaults),
    };
    let metadata = registry.lookup(&document_id);

    let pipeline = LineItemPipeline::new().with_max_keywords(config.ingestion.max_keywords);
    let report = pipeline.reconstructor().reconstruct_with_report(&lines);
    let items = pipeline.build_items(&report.items, &metadata);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    output::section(&format!("Document {}", document_id));
    output::key_value("Encoding", &extracted.encoding);
    output::key_value("Lines", &lines.len().to_string());
    output::key_value(
        "Header",
        &report
            .header_at
            .map(|(page, line)| format!("page {} line {}", page, line))
            .unwrap_or_else(|| "not found, read from first line".to_string()),
    );
    output::key_value(
        "Footer",
        &report
            .footer_at
            .map(|(page, line)| format!("page {} line {}", page, line))
            .unwrap_or_else(|| "not found".to_string()),
    );
    output::key_value(
        "Rates",
        &format!(
            "premium {}%, tax {}% ({})",
            metadata.premium_percent, metadata.tax_percent, metadata.auction_id
        ),
    );
    for warning in &extracted.warnings {
        output::warning(warning);
    }
    if report.discarded_lines > 0 {
        output::warning(&format!(
            "{} trailing description lines had no price and were dropped",
            report.discarded_lines
        ));
    }

    if items.is_empty() {
        println!("{}", "No line items found.".dimmed());
        return Ok(());
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .enumerate()
        .map(|(idx, item)| ItemRow {
            ordinal: idx + 1,
            description: output::truncate(&item.description, 48),
            bid: item.bid_amount.to_string(),
            category: item.category.to_string(),
            condition: item.condition.to_string(),
            total: item.total_cost.to_string(),
        })
        .collect();

    println!("{}", Table::new(rows));
    output::success(&format!("{} line items", items.len()));

    Ok(())
}
