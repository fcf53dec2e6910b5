//! Keyword extraction
//!
//! Lowercased alphabetic terms of a description, stopwords and short tokens
//! removed, deduplicated in first-seen order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Default cap on keywords stored per item
pub const DEFAULT_MAX_KEYWORDS: usize = 20;

const MIN_KEYWORD_LEN: usize = 3;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]+\b").expect("valid regex"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "with", "from", "this", "that", "these", "those", "are", "was",
        "were", "has", "have", "had", "not", "but", "all", "any", "its", "one", "two", "three",
        "four", "five", "six", "set", "lot", "lots", "item", "items", "each", "per", "pair",
        "various", "assorted", "misc", "approx", "size", "inch", "inches", "box", "group",
        "includes", "including", "some", "other", "very", "into", "our", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Stopword-filtered search terms for an item description
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    max_keywords: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYWORDS)
    }
}

impl KeywordExtractor {
    pub fn new(max_keywords: usize) -> Self {
        Self { max_keywords }
    }

    pub fn max_keywords(&self) -> usize {
        self.max_keywords
    }

    /// Lowercased alphabetic terms in first-seen order, deduplicated and capped
    pub fn extract(&self, description: &str) -> Vec<String> {
        let lowered = description.to_lowercase();
        let mut seen = HashSet::new();

        WORD.find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|w| w.len() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(w))
            .filter(|w| seen.insert(*w))
            .take(self.max_keywords)
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_filters_and_dedupes() {
        let extractor = KeywordExtractor::default();
        let keywords = extractor.extract("Victorian tea set with TEA cups, 6 pcs and saucers");
        assert_eq!(keywords, vec!["victorian", "tea", "cups", "pcs", "saucers"]);
    }

    #[test]
    fn test_extract_is_capped() {
        let extractor = KeywordExtractor::new(3);
        let keywords = extractor.extract("walnut bookcase glass doors carved crown");
        assert_eq!(keywords, vec!["walnut", "bookcase", "glass"]);
    }

    #[test]
    fn test_extract_ignores_digits_and_short_words() {
        let extractor = KeywordExtractor::default();
        assert_eq!(extractor.extract("A1 12 of ox"), Vec::<String>::new());
        assert_eq!(extractor.extract("14k gold ring"), vec!["gold", "ring"]);
    }
}
