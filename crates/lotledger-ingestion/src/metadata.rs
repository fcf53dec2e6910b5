//! Auction metadata registry
//!
//! Per-document financial context loaded once per run from a CSV file with a
//! header row and the columns
//! `document_id, auction_id, date, premium_percent, tax_percent`.
//! A lookup miss never fails: the configured default rates apply.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use lotledger_core::{AuctionMetadata, FinancialDefaults};

use crate::{IngestionError, Result};

/// Auction id recorded for documents without a metadata row
pub const UNASSIGNED_AUCTION: &str = "unassigned";

const COLUMNS: usize = 5;

/// Immutable lookup of auction metadata by document id
#[derive(Debug, Clone, Default)]
pub struct AuctionMetadataRegistry {
    entries: HashMap<String, AuctionMetadata>,
    defaults: FinancialDefaults,
    fallback_date: Option<NaiveDate>,
}

impl AuctionMetadataRegistry {
    pub fn new(defaults: FinancialDefaults) -> Self {
        Self {
            entries: HashMap::new(),
            defaults,
            fallback_date: None,
        }
    }

    /// Date used on a lookup miss instead of today
    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = Some(date);
        self
    }

    /// Load from a CSV file
    pub async fn load(path: impl AsRef<Path>, defaults: FinancialDefaults) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|e| {
            IngestionError::Metadata(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_reader(content.as_slice(), defaults)?;

        info!(
            path = %path.display(),
            entries = registry.len(),
            "Auction metadata loaded"
        );
        Ok(registry)
    }

    /// Parse CSV content. The first row is a header and is skipped.
    pub fn from_reader<R: std::io::Read>(reader: R, defaults: FinancialDefaults) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut registry = Self::new(defaults);
        for (idx, record) in csv.records().enumerate() {
            // Header is row 1
            let row = idx + 2;
            let record = record.map_err(|e| IngestionError::Metadata(format!("Row {}: {}", row, e)))?;
            let metadata = parse_record(&record, row)?;
            registry.insert(metadata);
        }
        Ok(registry)
    }

    /// Add or replace a document's metadata
    pub fn insert(&mut self, metadata: AuctionMetadata) {
        if let Some(previous) = self.entries.insert(metadata.document_id.clone(), metadata) {
            warn!(document_id = %previous.document_id, "Duplicate metadata row, later row wins");
        }
    }

    pub fn get(&self, document_id: &str) -> Option<&AuctionMetadata> {
        self.entries.get(document_id)
    }

    /// Metadata for a document, falling back to the default rates on a miss
    pub fn lookup(&self, document_id: &str) -> AuctionMetadata {
        if let Some(metadata) = self.entries.get(document_id) {
            return metadata.clone();
        }

        info!(
            document_id = %document_id,
            premium_percent = %self.defaults.premium_percent,
            tax_percent = %self.defaults.tax_percent,
            "No auction metadata, using default rates"
        );

        AuctionMetadata {
            document_id: document_id.to_string(),
            auction_id: UNASSIGNED_AUCTION.to_string(),
            date: self
                .fallback_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            premium_percent: self.defaults.premium_percent.clone(),
            tax_percent: self.defaults.tax_percent.clone(),
        }
    }

    pub fn defaults(&self) -> &FinancialDefaults {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_record(record: &csv::StringRecord, row: usize) -> Result<AuctionMetadata> {
    if record.len() < COLUMNS {
        return Err(IngestionError::Metadata(format!(
            "Row {}: expected {} columns, found {}",
            row,
            COLUMNS,
            record.len()
        )));
    }

    let field = |i: usize| record.get(i).unwrap_or_default();

    let document_id = field(0);
    if document_id.is_empty() {
        return Err(IngestionError::Metadata(format!("Row {}: empty document_id", row)));
    }

    Ok(AuctionMetadata {
        document_id: document_id.to_string(),
        auction_id: field(1).to_string(),
        date: parse_date(field(2)).ok_or_else(|| {
            IngestionError::Metadata(format!("Row {}: invalid date '{}'", row, field(2)))
        })?,
        premium_percent: parse_percent(field(3), "premium_percent", row)?,
        tax_percent: parse_percent(field(4), "tax_percent", row)?,
    })
}

/// ISO-8601 calendar date, or a full RFC 3339 timestamp
fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

fn parse_percent(value: &str, column: &str, row: usize) -> Result<BigDecimal> {
    let parsed = BigDecimal::from_str(value.trim_end_matches('%').trim()).map_err(|_| {
        IngestionError::Metadata(format!("Row {}: invalid {} '{}'", row, column, value))
    })?;
    if parsed < BigDecimal::from(0) {
        return Err(IngestionError::Metadata(format!(
            "Row {}: negative {} '{}'",
            row, column, value
        )));
    }
    Ok(parsed)
}
