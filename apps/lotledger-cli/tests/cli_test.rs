//! End-to-end tests for the lotledger binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const INVOICE: &str = "\
LOT  DESCRIPTION                 PRICE
1    Victorian tea set           150.00
2    Mahogany table
     with six chairs           1,200.00
SUBTOTAL                       1,350.00
";

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let invoices = dir.path().join("invoices");
    std::fs::create_dir(&invoices).unwrap();
    std::fs::write(invoices.join("INV-1.txt"), INVOICE).unwrap();
    std::fs::write(invoices.join("INV-2.txt"), "no lots on this page\n").unwrap();
    std::fs::write(
        dir.path().join("auctions.csv"),
        "document_id,auction_id,date,premium_percent,tax_percent\nINV-1,AUC-1,2024-03-02,20,8\n",
    )
    .unwrap();
    dir
}

fn lotledger(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lotledger").unwrap();
    cmd.current_dir(dir)
        .env_remove("DATABASE_URL")
        .env_remove("LOTLEDGER__DATABASE__URL")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn test_dry_run_reports_progress_and_summary() {
    let dir = workspace();

    lotledger(dir.path())
        .args([
            "ingest",
            "--documents",
            "invoices",
            "--metadata",
            "auctions.csv",
            "--checkpoint",
            "state/checkpoint.json",
            "--dry-run",
            "--summary-json",
            "summary.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("PROGRESS 1/2 INV-1"))
        .stdout(predicate::str::contains("SUCCESS INV-1: 2 items"))
        .stdout(predicate::str::contains("WARNING INV-2"))
        .stdout(predicate::str::contains("Dry Run Summary"));

    assert!(!dir.path().join("state/checkpoint.json").exists());

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["failed_empty"], 1);
    assert_eq!(summary["items_created"], 2);
    assert_eq!(summary["failed_documents"], serde_json::json!(["INV-2"]));
}

#[test]
fn test_missing_document_directory_fails_to_start() {
    let dir = workspace();

    lotledger(dir.path())
        .args([
            "ingest",
            "--documents",
            "does-not-exist",
            "--metadata",
            "auctions.csv",
            "--dry-run",
        ])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cannot enumerate documents"));
}

#[test]
fn test_live_run_requires_database_url() {
    let dir = workspace();

    lotledger(dir.path())
        .args(["ingest", "--documents", "invoices", "--metadata", "auctions.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("database URL is required"));
}

#[test]
fn test_invalid_default_rate_is_rejected() {
    let dir = workspace();

    lotledger(dir.path())
        .args([
            "ingest",
            "--documents",
            "invoices",
            "--metadata",
            "auctions.csv",
            "--dry-run",
            "--default-tax",
            "eight",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid default premium or tax"));
}

#[test]
fn test_inspect_prints_items() {
    let dir = workspace();

    lotledger(dir.path())
        .args(["inspect", "invoices/INV-1.txt", "--metadata", "auctions.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mahogany table with six chairs"))
        .stdout(predicate::str::contains("furniture"))
        .stdout(predicate::str::contains("194.40"));
}

#[test]
fn test_inspect_json() {
    let dir = workspace();

    let output = lotledger(dir.path())
        .args(["inspect", "invoices/INV-1.txt", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let items: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_eq!(items[0]["description"], "Victorian tea set");
    assert_eq!(items[0]["category"], "antiques");
}
