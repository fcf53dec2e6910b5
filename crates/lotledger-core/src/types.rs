use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use uuid::Uuid;

// Newtype wrappers for type safety

/// Identity of a persisted line item.
///
/// Derived from the item's content so that re-processing the same document
/// yields the same identities and conflicting inserts are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(Uuid);

impl LineItemId {
    pub fn from_content(
        document_id: &str,
        ordinal: usize,
        description: &str,
        price: &BigDecimal,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(document_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(ordinal.to_le_bytes());
        hasher.update(description.as_bytes());
        hasher.update([0u8]);
        hasher.update(price.with_scale(2).to_string().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for LineItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Extraction types

/// One line of extractor output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTextLine {
    /// 1-based page number
    pub page: u32,
    /// 1-based line number within the page
    pub line: u32,
    pub text: String,
}

impl RawTextLine {
    pub fn new(page: u32, line: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            line,
            text: text.into(),
        }
    }

    /// Build a single-page line sequence, mostly useful for tests and tooling
    pub fn from_lines<I, S>(lines: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(1, i as u32 + 1, text))
            .collect()
    }
}

/// A reconstructed lot before classification and costing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub description: String,
    pub price: BigDecimal,
}

impl RawItem {
    pub fn new(description: impl Into<String>, price: BigDecimal) -> Self {
        Self {
            description: description.into(),
            price,
        }
    }
}

/// Per-document auction financial context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionMetadata {
    pub document_id: String,
    pub auction_id: String,
    pub date: NaiveDate,
    pub premium_percent: BigDecimal,
    pub tax_percent: BigDecimal,
}

// Classification types

/// Item category taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Antiques,
    Art,
    Books,
    Ceramics,
    Clocks,
    Clothing,
    Coins,
    Collectibles,
    Electronics,
    Furniture,
    Glassware,
    Jewelry,
    Lighting,
    MusicalInstruments,
    Rugs,
    Silver,
    Sports,
    Tools,
    Toys,
    Watches,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Antiques => "antiques",
            Category::Art => "art",
            Category::Books => "books",
            Category::Ceramics => "ceramics",
            Category::Clocks => "clocks",
            Category::Clothing => "clothing",
            Category::Coins => "coins",
            Category::Collectibles => "collectibles",
            Category::Electronics => "electronics",
            Category::Furniture => "furniture",
            Category::Glassware => "glassware",
            Category::Jewelry => "jewelry",
            Category::Lighting => "lighting",
            Category::MusicalInstruments => "musical_instruments",
            Category::Rugs => "rugs",
            Category::Silver => "silver",
            Category::Sports => "sports",
            Category::Tools => "tools",
            Category::Toys => "toys",
            Category::Watches => "watches",
            Category::Other => "other",
        }
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Other
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item condition buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ForParts,
    Poor,
    New,
    Excellent,
    Good,
    Fair,
    Unknown,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::ForParts => "for_parts",
            Condition::Poor => "poor",
            Condition::New => "new",
            Condition::Excellent => "excellent",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Unknown => "unknown",
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Unknown
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Persisted record

/// A fully-built, persisted inventory line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLineItem {
    pub id: LineItemId,
    pub document_id: String,
    pub auction_id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub condition: Condition,
    pub quantity: i32,
    pub bid_amount: BigDecimal,
    pub premium: BigDecimal,
    pub tax: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub total_cost: BigDecimal,
    pub cost_per_item: BigDecimal,
    pub acquisition_date: NaiveDate,
    pub keywords: Vec<String>,
}

impl InventoryLineItem {
    /// `total_cost == bid_amount + premium + tax + shipping_cost`
    pub fn cost_identity_holds(&self) -> bool {
        let sum = &self.bid_amount + &self.premium + &self.tax + &self.shipping_cost;
        sum == self.total_cost
    }
}

// Checkpoint

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointRecord {
    processed_invoices: Vec<String>,
    processed_count: u64,
    last_update: DateTime<Utc>,
}

/// Durable record of documents that were fully and successfully persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CheckpointRecord", into = "CheckpointRecord")]
pub struct IngestionCheckpoint {
    processed: Vec<String>,
    index: HashSet<String>,
    processed_count: u64,
    last_update: DateTime<Utc>,
}

impl IngestionCheckpoint {
    pub fn new() -> Self {
        Self {
            processed: Vec::new(),
            index: HashSet::new(),
            processed_count: 0,
            last_update: Utc::now(),
        }
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.index.contains(document_id)
    }

    /// Record a successfully committed document. Returns false if it was already present.
    pub fn mark_processed(&mut self, document_id: impl Into<String>) -> bool {
        let document_id = document_id.into();
        if !self.index.insert(document_id.clone()) {
            return false;
        }
        self.processed.push(document_id);
        self.processed_count += 1;
        self.last_update = Utc::now();
        true
    }

    pub fn processed_ids(&self) -> &[String] {
        &self.processed
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

impl Default for IngestionCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl From<CheckpointRecord> for IngestionCheckpoint {
    fn from(record: CheckpointRecord) -> Self {
        let mut processed = Vec::with_capacity(record.processed_invoices.len());
        let mut index = HashSet::with_capacity(record.processed_invoices.len());
        for id in record.processed_invoices {
            if index.insert(id.clone()) {
                processed.push(id);
            }
        }
        Self {
            processed_count: record.processed_count.max(processed.len() as u64),
            processed,
            index,
            last_update: record.last_update,
        }
    }
}

impl From<IngestionCheckpoint> for CheckpointRecord {
    fn from(checkpoint: IngestionCheckpoint) -> Self {
        Self {
            processed_invoices: checkpoint.processed,
            processed_count: checkpoint.processed_count,
            last_update: checkpoint.last_update,
        }
    }
}
