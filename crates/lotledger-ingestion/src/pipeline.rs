//! Line item pipeline
//!
//! Raw text lines -> reconstructed lots -> stripped, classified, costed
//! inventory line items. Pure with respect to other documents.

use bigdecimal::BigDecimal;
use std::sync::Arc;
use tracing::debug;

use lotledger_core::{AuctionMetadata, InventoryLineItem, LineItemId, RawItem, RawTextLine};

use crate::classifier::{ItemClassifier, Taxonomy};
use crate::financial::{CostInput, FinancialCalculator};
use crate::keywords::KeywordExtractor;
use crate::processors::NoiseStripper;
use crate::reconstruct::LineReconstructor;

/// Maximum characters kept in an item's display name
pub const MAX_NAME_CHARS: usize = 100;

/// Builds inventory line items for one document at a time
#[derive(Debug, Clone, Default)]
pub struct LineItemPipeline {
    reconstructor: LineReconstructor,
    stripper: NoiseStripper,
    classifier: ItemClassifier,
    keywords: KeywordExtractor,
    calculator: FinancialCalculator,
}

impl LineItemPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<Taxonomy>) -> Self {
        self.classifier = ItemClassifier::new(taxonomy);
        self
    }

    pub fn with_max_keywords(mut self, max_keywords: usize) -> Self {
        self.keywords = KeywordExtractor::new(max_keywords);
        self
    }

    pub fn with_reconstructor(mut self, reconstructor: LineReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    pub fn with_stripper(mut self, stripper: NoiseStripper) -> Self {
        self.stripper = stripper;
        self
    }

    pub fn reconstructor(&self) -> &LineReconstructor {
        &self.reconstructor
    }

    pub fn classifier(&self) -> &ItemClassifier {
        &self.classifier
    }

    /// Reconstruct and build all line items of a document
    pub fn build(&self, lines: &[RawTextLine], metadata: &AuctionMetadata) -> Vec<InventoryLineItem> {
        let raw_items = self.reconstructor.reconstruct(lines);
        debug!(
            document_id = %metadata.document_id,
            lines = lines.len(),
            raw_items = raw_items.len(),
            "Reconstructed document"
        );
        self.build_items(&raw_items, metadata)
    }

    /// Build line items from already reconstructed lots
    pub fn build_items(&self, raw_items: &[RawItem], metadata: &AuctionMetadata) -> Vec<InventoryLineItem> {
        raw_items
            .iter()
            .enumerate()
            .map(|(ordinal, raw)| self.build_item(ordinal, raw, metadata))
            .collect()
    }

    fn build_item(&self, ordinal: usize, raw: &RawItem, metadata: &AuctionMetadata) -> InventoryLineItem {
        let description = self.stripper.strip(&raw.description);
        let (category, condition) = self.classifier.classify(&description);
        let keywords = self.keywords.extract(&description);

        let cost = self.calculator.calculate(&CostInput::new(
            raw.price.clone(),
            metadata.premium_percent.clone(),
            metadata.tax_percent.clone(),
        ));

        InventoryLineItem {
            id: LineItemId::from_content(&metadata.document_id, ordinal, &description, &raw.price),
            document_id: metadata.document_id.clone(),
            auction_id: metadata.auction_id.clone(),
            name: truncate_chars(&description, MAX_NAME_CHARS),
            description,
            category,
            condition,
            quantity: cost.quantity,
            bid_amount: raw.price.clone(),
            premium: cost.premium,
            tax: cost.tax,
            shipping_cost: BigDecimal::from(0),
            total_cost: cost.total_cost,
            cost_per_item: cost.cost_per_item,
            acquisition_date: metadata.date,
            keywords,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use lotledger_core::{Category, Condition};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn metadata() -> AuctionMetadata {
        AuctionMetadata {
            document_id: "INV-100".to_string(),
            auction_id: "AUC-7".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            premium_percent: dec("18"),
            tax_percent: dec("8.625"),
        }
    }

    #[test]
    fn test_build_document() {
        let lines = RawTextLine::from_lines([
            "LOT DESCRIPTION PRICE",
            "1 Lot #12 Mahogany table",
            "with six chairs, good 1200.00",
            "2 Victorian tea set 150.00",
            "SUBTOTAL 1350.00",
        ]);

        let items = LineItemPipeline::new().build(&lines, &metadata());
        assert_eq!(items.len(), 2);

        let table = &items[0];
        assert_eq!(table.description, "Mahogany table with six chairs, good");
        assert_eq!(table.category, Category::Furniture);
        assert_eq!(table.condition, Condition::Good);
        assert_eq!(table.bid_amount, dec("1200.00"));
        assert_eq!(table.premium, dec("216.00"));
        assert_eq!(table.auction_id, "AUC-7");
        assert!(table.cost_identity_holds());

        let tea = &items[1];
        assert_eq!(tea.total_cost, dec("192.27"));
        assert_eq!(tea.keywords, vec!["victorian", "tea"]);
        assert_eq!(tea.quantity, 1);
        assert_eq!(tea.shipping_cost, dec("0"));
    }

    #[test]
    fn test_ids_are_stable_across_runs() {
        let lines = RawTextLine::from_lines(["Brass lamp 45.00", "Brass lamp 45.00"]);
        let pipeline = LineItemPipeline::new();

        let first = pipeline.build(&lines, &metadata());
        let second = pipeline.build(&lines, &metadata());

        assert_eq!(first[0].id, second[0].id);
        // Identical lots on one invoice stay distinct
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_name_is_truncated() {
        let long = "Carved ".repeat(30);
        let raw = RawItem::new(long.trim(), dec("5.00"));
        let item = &LineItemPipeline::new().build_items(&[raw], &metadata())[0];

        assert!(item.name.chars().count() <= MAX_NAME_CHARS);
        assert!(item.description.len() > item.name.len());
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("Café chair", 4), "Café");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
