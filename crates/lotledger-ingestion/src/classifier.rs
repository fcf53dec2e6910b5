//! Item classification
//!
//! Category is chosen by weighted keyword scoring: each category scores one
//! point per keyword found in the description (case-insensitive substring).
//! The highest score wins, ties go to the lexicographically smallest category
//! name, and a zero score yields `other`.
//!
//! Condition is first-match over an ordered table. Order matters: "not
//! working" must be seen as `for_parts` before "working" reads as `good`.

use std::sync::Arc;
use tracing::trace;

use lotledger_core::{Category, Condition};

/// Keywords that vote for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: Category, keywords: &[&str]) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Number of keywords present in an already lowercased description
    pub fn score(&self, description: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| description.contains(k.as_str()))
            .count()
    }
}

/// Keywords that identify one condition bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionRule {
    pub condition: Condition,
    pub keywords: Vec<String>,
}

impl ConditionRule {
    pub fn new(condition: Condition, keywords: &[&str]) -> Self {
        Self {
            condition,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, description: &str) -> bool {
        self.keywords.iter().any(|k| description.contains(k.as_str()))
    }
}

/// Immutable category and condition tables, built once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<CategoryRule>,
    conditions: Vec<ConditionRule>,
}

impl Taxonomy {
    pub fn new(categories: Vec<CategoryRule>, conditions: Vec<ConditionRule>) -> Self {
        Self {
            categories,
            conditions,
        }
    }

    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    /// Condition rules in evaluation order
    pub fn conditions(&self) -> &[ConditionRule] {
        &self.conditions
    }

    /// Taxonomy for general estate and antiques auctions
    pub fn standard() -> Self {
        use Category::*;

        let categories = vec![
            CategoryRule::new(
                Antiques,
                &["antique", "victorian", "edwardian", "georgian", "primitive", "circa", "19th century", "18th century"],
            ),
            CategoryRule::new(
                Art,
                &["painting", "oil on canvas", "watercolor", "lithograph", "etching", "sculpture", "portrait", "framed print"],
            ),
            CategoryRule::new(
                Books,
                &["book", "novel", "first edition", "hardcover", "paperback", "atlas", "bible", "manuscript"],
            ),
            CategoryRule::new(
                Ceramics,
                &["pottery", "porcelain", "ceramic", "stoneware", "earthenware", "majolica", "figurine", "tea set", "teapot"],
            ),
            CategoryRule::new(
                Clocks,
                &["clock", "grandfather", "cuckoo", "timepiece", "regulator"],
            ),
            CategoryRule::new(
                Clothing,
                &["dress", "coat", "jacket", "shirt", "scarf", "gloves", "shoes", "fur stole"],
            ),
            CategoryRule::new(
                Coins,
                &["coin", "silver dollar", "penny", "banknote", "proof set", "mint set", "numismatic"],
            ),
            CategoryRule::new(
                Collectibles,
                &["collectible", "memorabilia", "stamp", "postcard", "autograph", "trading card", "comic"],
            ),
            CategoryRule::new(
                Electronics,
                &["radio", "television", "stereo", "speaker", "amplifier", "camera", "computer", "turntable", "phonograph"],
            ),
            CategoryRule::new(
                Furniture,
                &["table", "chair", "dresser", "desk", "cabinet", "bookcase", "chest", "sofa", "armoire", "bench", "sideboard", "nightstand"],
            ),
            CategoryRule::new(
                Glassware,
                &["glass", "crystal", "goblet", "decanter", "tumbler", "stemware"],
            ),
            CategoryRule::new(
                Jewelry,
                &["jewelry", "necklace", "bracelet", "brooch", "earrings", "pendant", "diamond", "pearl", "cameo", "14k", "18k"],
            ),
            CategoryRule::new(
                Lighting,
                &["lamp", "chandelier", "sconce", "lantern", "candelabra", "light fixture"],
            ),
            CategoryRule::new(
                MusicalInstruments,
                &["guitar", "violin", "piano", "banjo", "trumpet", "saxophone", "drum", "flute", "accordion", "cello", "ukulele"],
            ),
            CategoryRule::new(
                Rugs,
                &["rug", "carpet", "kilim", "runner", "persian", "oriental", "tapestry"],
            ),
            CategoryRule::new(
                Silver,
                &["sterling", "silver", "silverplate", "flatware", "tea service", ".925"],
            ),
            CategoryRule::new(
                Sports,
                &["golf", "baseball", "football", "fishing", "tennis", "bicycle", "hockey", "skis"],
            ),
            CategoryRule::new(
                Tools,
                &["tool", "wrench", "hammer", "drill", "chisel", "anvil", "vise", "hand saw", "socket set"],
            ),
            CategoryRule::new(
                Toys,
                &["toy", "doll", "teddy", "train set", "lego", "puzzle", "board game", "marbles", "action figure"],
            ),
            CategoryRule::new(
                Watches,
                &["watch", "wristwatch", "pocket watch", "chronograph", "rolex", "omega"],
            ),
        ];

        let conditions = vec![
            ConditionRule::new(
                Condition::ForParts,
                &["for parts", "not working", "as is", "as-is", "broken", "needs repair"],
            ),
            ConditionRule::new(
                Condition::Poor,
                &["poor", "heavily worn", "damaged", "cracked", "chipped"],
            ),
            ConditionRule::new(
                Condition::New,
                &["brand new", "new in box", "nib", "sealed", "unused"],
            ),
            ConditionRule::new(
                Condition::Excellent,
                &["excellent", "like new", "mint", "pristine"],
            ),
            ConditionRule::new(
                Condition::Good,
                &["very good", "good", "working", "works"],
            ),
            ConditionRule::new(Condition::Fair, &["fair", "worn", "used", "wear"]),
        ];

        Self::new(categories, conditions)
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Assigns a category and condition to a cleaned description
#[derive(Debug, Clone)]
pub struct ItemClassifier {
    taxonomy: Arc<Taxonomy>,
}

impl Default for ItemClassifier {
    fn default() -> Self {
        Self::new(Arc::new(Taxonomy::standard()))
    }
}

impl ItemClassifier {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn classify(&self, description: &str) -> (Category, Condition) {
        let lowered = description.to_lowercase();
        let category = self.category_of(&lowered);
        let condition = self.condition_of(&lowered);
        trace!(%category, %condition, "Classified item");
        (category, condition)
    }

    pub fn classify_category(&self, description: &str) -> Category {
        self.category_of(&description.to_lowercase())
    }

    pub fn classify_condition(&self, description: &str) -> Condition {
        self.condition_of(&description.to_lowercase())
    }

    /// Non-zero category scores, best first
    pub fn scores(&self, description: &str) -> Vec<(Category, usize)> {
        let lowered = description.to_lowercase();
        let mut scores: Vec<_> = self
            .taxonomy
            .categories
            .iter()
            .map(|rule| (rule.category, rule.score(&lowered)))
            .filter(|(_, score)| *score > 0)
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        scores
    }

    fn category_of(&self, lowered: &str) -> Category {
        let mut best: Option<(Category, usize)> = None;

        for rule in &self.taxonomy.categories {
            let score = rule.score(lowered);
            if score == 0 {
                continue;
            }
            best = match best {
                Some((current, top))
                    if top > score
                        || (top == score && current.as_str() <= rule.category.as_str()) =>
                {
                    Some((current, top))
                }
                _ => Some((rule.category, score)),
            };
        }

        best.map(|(category, _)| category).unwrap_or_default()
    }

    fn condition_of(&self, lowered: &str) -> Condition {
        self.taxonomy
            .conditions
            .iter()
            .find(|rule| rule.matches(lowered))
            .map(|rule| rule.condition)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_highest_score_wins() {
        let classifier = ItemClassifier::default();
        assert_eq!(
            classifier.classify_category("Mahogany table with six chairs"),
            Category::Furniture
        );
        assert_eq!(
            classifier.classify_category("Sterling silver tea service"),
            Category::Silver
        );
        assert_eq!(
            classifier.classify_category("Oak grandfather clock"),
            Category::Clocks
        );
    }

    #[test]
    fn test_ties_break_by_category_name() {
        let classifier = ItemClassifier::default();
        // "victorian" (antiques) and "tea set" (ceramics) score one each
        assert_eq!(
            classifier.classify_category("Victorian tea set"),
            Category::Antiques
        );

        // Independent of table order
        let taxonomy = Taxonomy::new(
            vec![
                CategoryRule::new(Category::Toys, &["tin"]),
                CategoryRule::new(Category::Collectibles, &["tin"]),
            ],
            vec![],
        );
        let classifier = ItemClassifier::new(Arc::new(taxonomy));
        assert_eq!(classifier.classify_category("Tin robot"), Category::Collectibles);
    }

    #[test]
    fn test_unmatched_description_falls_back() {
        let classifier = ItemClassifier::default();
        assert_eq!(
            classifier.classify("Box of sundries"),
            (Category::Other, Condition::Unknown)
        );
    }

    #[test]
    fn test_condition_is_first_match() {
        let classifier = ItemClassifier::default();
        assert_eq!(classifier.classify_condition("Radio, not working"), Condition::ForParts);
        assert_eq!(classifier.classify_condition("Good but CHIPPED rim"), Condition::Poor);
        assert_eq!(classifier.classify_condition("Unused in original box"), Condition::New);
        assert_eq!(classifier.classify_condition("Like new, works"), Condition::Excellent);
        assert_eq!(classifier.classify_condition("Lamp, works"), Condition::Good);
        assert_eq!(classifier.classify_condition("Some wear to finish"), Condition::Fair);
    }

    #[test]
    fn test_scores_are_sorted() {
        let classifier = ItemClassifier::default();
        let scores = classifier.scores("Antique Victorian oak desk");
        assert_eq!(scores[0], (Category::Antiques, 2));
        assert_eq!(scores[1], (Category::Furniture, 1));
    }
}
