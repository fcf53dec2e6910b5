//! lotledger CLI
//!
//! Ingests OCR'd auction invoices into the inventory ledger.

mod commands;
mod output;
mod telemetry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use lotledger_core::AppConfig;

#[derive(Parser)]
#[command(
    name = "lotledger",
    author = "Lotledger Team",
    version,
    about = "Auction invoice ingestion",
    long_about = "Reconstructs purchased lots from OCR'd auction invoices, classifies them,\n\
                  computes landed cost, and records them in the inventory ledger.\n\n\
                  Runs are resumable: invoices already committed are recorded in a\n\
                  checkpoint file and skipped on the next run."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, env = "LOTLEDGER_LOG", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (TOML); LOTLEDGER__* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a directory of invoices
    Ingest(commands::ingest::IngestArgs),

    /// Show the line items reconstructed from a single invoice
    Inspect(commands::inspect::InspectArgs),
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(&path.to_string_lossy())
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => AppConfig::load().context("Failed to load configuration"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = telemetry::init_telemetry(&cli.log_level, cli.json_logs) {
        output::error(&format!("{:#}", e));
        return ExitCode::FAILURE;
    }

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Ingest(args) => commands::ingest::run(args, config).await.map(|_| ()),
            Commands::Inspect(args) => commands::inspect::run(args, config).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ingest_flags_parse() {
        let cli = Cli::try_parse_from([
            "lotledger",
            "ingest",
            "--documents",
            "invoices",
            "--metadata",
            "auctions.csv",
            "--dry-run",
            "--parallelism",
            "4",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Commands::Ingest(args) => {
                assert!(args.dry_run);
                assert!(!args.force);
                assert_eq!(args.parallelism, Some(4));
                assert_eq!(args.checkpoint, PathBuf::from("ingestion_checkpoint.json"));
            }
            Commands::Inspect(_) => panic!("expected ingest"),
        }
    }
}
