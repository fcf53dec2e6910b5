//! Description processors
//!
//! Cleanup applied to reconstructed descriptions: removal of lot/item codes
//! that OCR leaves embedded in the text, filler dashes, and stray ids.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

/// Maximum number of trailing code tokens removed from a price line
pub const MAX_TRAILING_CODES: usize = 4;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static FILLER_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{3,}").expect("valid regex"));

static LEADING_NUMERIC_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#?\d+[.):]?\s+").expect("valid regex"));

static TRAILING_LONG_NUMERIC_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+#?\d{5,}\s*$").expect("valid regex"));

/// A lot or item code: a short token carrying a digit (optionally with up to
/// three leading letters), or a lone uppercase letter
static CODE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Z]{0,3}[0-9][A-Z0-9-]{0,5}|[A-Z])$").expect("valid regex")
});

static EMBEDDED_CODES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // "Lot #12", "Item No. 45", "SKU: AB-12", "Ref 778"
        r"(?i)\b(?:lot|item|sku|ref|inv)\s*(?:#|no\.?|number|:)?\s*[A-Z]{0,3}-?\d[A-Z0-9-]*\b",
        // "(ID 12345)", "(lot 7)"
        r"(?i)\(\s*(?:id|lot|item)\b[^)]*\)",
        // Bare "#123"
        r"#\d+\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static EDGE_PUNCTUATION: &[char] = &['-', ',', ';', ':', '/', '|', '.'];

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Remove a trailing run of 1 to 4 lot/item code tokens from a price-line
/// fragment. The run is only removed when at least one of its tokens carries
/// a digit, so all-caps words such as "TEA SET" survive.
pub fn strip_trailing_codes(fragment: &str) -> String {
    let tokens: Vec<&str> = fragment.split_whitespace().collect();

    let run = tokens
        .iter()
        .rev()
        .take(MAX_TRAILING_CODES)
        .take_while(|t| CODE_TOKEN.is_match(t))
        .count();

    let run_has_digit = tokens[tokens.len() - run..]
        .iter()
        .any(|t| t.chars().any(|c| c.is_ascii_digit()));

    if run == 0 || !run_has_digit {
        return tokens.join(" ");
    }

    trace!(removed = run, "Stripped trailing code tokens");
    tokens[..tokens.len() - run].join(" ")
}

/// Final cleanup of a joined description: leading numeric id, trailing long
/// numeric id, residual filler dashes, repeated whitespace
pub fn clean_description(text: &str) -> String {
    let text = LEADING_NUMERIC_ID.replace(text, "");
    let text = TRAILING_LONG_NUMERIC_ID.replace(&text, "");
    let text = FILLER_DASHES.replace_all(&text, " ");
    collapse_whitespace(&text)
}

/// Removes embedded lot/item id tokens from descriptions before
/// classification and persistence
#[derive(Debug, Clone, Default)]
pub struct NoiseStripper {
    extra_patterns: Vec<Regex>,
}

impl NoiseStripper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site-specific pattern to strip
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.extra_patterns.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Strip embedded codes. If nothing but codes was present, the input is
    /// returned cleaned but otherwise intact.
    pub fn strip(&self, description: &str) -> String {
        let mut text = description.to_string();
        for pattern in EMBEDDED_CODES.iter().chain(self.extra_patterns.iter()) {
            text = pattern.replace_all(&text, " ").into_owned();
        }

        let stripped = collapse_whitespace(&text)
            .trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c) || c.is_whitespace())
            .to_string();

        if stripped.is_empty() {
            collapse_whitespace(description)
        } else {
            stripped
        }
    }
}
