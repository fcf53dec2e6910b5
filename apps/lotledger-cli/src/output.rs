//! Operator-facing output

use colored::Colorize;
use tabled::{Table, Tabled};

use lotledger_ingestion::{DocumentOutcome, DocumentStatus, ProgressReporter, RunSummary};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Print a key-value pair
pub fn key_value(key: &str, value: &str) {
    println!("{}: {}", key.bold(), value);
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.bold().underline());
}

/// Format duration in human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Line-per-document progress on the terminal
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for ConsoleReporter {
    fn on_start(&self, total: usize, dry_run: bool) {
        if dry_run {
            info(&format!("Dry run over {} documents, nothing will be persisted", total));
        } else {
            info(&format!("Ingesting {} documents", total));
        }
    }

    fn on_progress(&self, index: usize, total: usize, document_id: &str) {
        println!("{} {}/{} {}", "PROGRESS".dimmed(), index, total, document_id);
    }

    fn on_outcome(&self, outcome: &DocumentOutcome) {
        let id = &outcome.document_id;
        match outcome.status {
            DocumentStatus::Succeeded => println!(
                "{} {}: {} items",
                "SUCCESS".green().bold(),
                id,
                outcome.items
            ),
            DocumentStatus::FailedEmpty => println!(
                "{} {}: no line items found",
                "WARNING".yellow().bold(),
                id
            ),
            DocumentStatus::FailedError => println!(
                "{} {}: {}",
                "ERROR".red().bold(),
                id,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            DocumentStatus::Skipped => {
                println!("{} {}: already processed", "SKIPPED".dimmed(), id)
            }
        }
    }

    fn on_summary(&self, summary: &RunSummary) {
        print_summary(summary);
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Final human-readable run summary
pub fn print_summary(summary: &RunSummary) {
    section(if summary.dry_run {
        "Dry Run Summary"
    } else {
        "Ingestion Summary"
    });

    let rows = vec![
        SummaryRow { metric: "Documents", value: summary.total_documents.to_string() },
        SummaryRow { metric: "Processed", value: summary.processed.to_string() },
        SummaryRow { metric: "Succeeded", value: summary.succeeded.to_string() },
        SummaryRow { metric: "Failed (empty)", value: summary.failed_empty.to_string() },
        SummaryRow { metric: "Failed (error)", value: summary.failed_error.to_string() },
        SummaryRow { metric: "Skipped", value: summary.skipped.to_string() },
        SummaryRow { metric: "Items created", value: summary.items_created.to_string() },
        SummaryRow {
            metric: "Avg items / document",
            value: format!("{:.2}", summary.average_items_per_document),
        },
        SummaryRow { metric: "Elapsed", value: format_duration(summary.elapsed_ms) },
    ];
    println!("{}", Table::new(rows));

    if !summary.failed_documents.is_empty() {
        section("Failed documents");
        for id in &summary.failed_documents {
            println!("  - {}", id);
        }
    }

    if let Some(e) = &summary.checkpoint_error {
        error(&format!(
            "Checkpoint not saved ({}); committed documents will be re-read and skipped as duplicates next run",
            e
        ));
    }

    if summary.cancelled {
        warning("Run was cancelled, remaining documents will be picked up by the next run");
    } else if summary.failed() == 0 {
        success("All processed documents succeeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(2500), "2.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Café armchair", 7), "Café...");
    }
}
