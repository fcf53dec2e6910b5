//! Line reconstruction
//!
//! Recovers `(description, price)` lots from the loosely structured lines an
//! OCR pass produces for an auction invoice. Descriptions may span several
//! lines; the line carrying the price terminates the lot.
//!
//! States: `SeekingHeader -> Buffering -> Stopped`. Lines before the column
//! header are ignored, lines after the footer ("SUBTOTAL", "A payment of")
//! are never considered.

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, trace, warn};

use lotledger_core::{RawItem, RawTextLine};

use crate::processors::{clean_description, strip_trailing_codes};

static HEADER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\blot\b.*\bprice\b",
        r"(?i)\blead\b.*\bitem\b.*\bprice\b",
        r"(?i)\bitem\b.*\bdescription\b.*\b(?:price|amount)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static FOOTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\ba\s+payment\s+of\b|\bsub-?\s?total\b)").expect("valid regex")
});

static FILLER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{7,}").expect("valid regex"));

/// Optional `$`, optional thousands separators, exactly two decimals, at line end
static TRAILING_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(\$?(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2})\s*$").expect("valid regex")
});

/// Reconstructor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructorState {
    SeekingHeader,
    Buffering,
    Stopped,
}

/// Items recovered from one document plus what the machine observed on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub items: Vec<RawItem>,
    /// Position `(page, line)` of the column header, if one was found
    pub header_at: Option<(u32, u32)>,
    /// Position of the footer line that stopped reconstruction
    pub footer_at: Option<(u32, u32)>,
    /// Buffered description lines dropped because no price followed
    pub discarded_lines: usize,
    /// Price lines whose cleaned description came out empty
    pub discarded_items: usize,
}

/// Description lines waiting for a terminating price
#[derive(Debug, Default)]
struct PendingLineItem {
    lines: Vec<String>,
}

impl PendingLineItem {
    fn push(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Join the buffered lines with the terminating fragment and reset
    fn take_with(&mut self, fragment: &str) -> String {
        let mut parts = std::mem::take(&mut self.lines);
        parts.push(fragment.to_string());
        parts.join(" ")
    }
}

/// Outcome of feeding one line to the machine
enum Step {
    Skip,
    Stop,
    Buffer,
    Emit(RawItem),
    Discard,
}

/// Turns a document's ordered text lines into raw lots
#[derive(Debug, Clone)]
pub struct LineReconstructor {
    headers: Vec<Regex>,
    footer: Regex,
}

impl Default for LineReconstructor {
    fn default() -> Self {
        Self {
            headers: HEADER_PATTERNS.clone(),
            footer: FOOTER_PATTERN.clone(),
        }
    }
}

impl LineReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognize an additional column header layout
    pub fn with_header_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.headers.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Column header line. A line ending in a price is always a lot, even
    /// when its description reads like a header ("Lot of price guides 12.00").
    pub fn is_header(&self, text: &str) -> bool {
        self.headers.iter().any(|h| h.is_match(text)) && split_price(text).is_none()
    }

    pub fn is_footer(&self, text: &str) -> bool {
        self.footer.is_match(text)
    }

    /// Reconstruct raw items from ordered lines
    pub fn reconstruct(&self, lines: &[RawTextLine]) -> Vec<RawItem> {
        self.reconstruct_with_report(lines).items
    }

    /// Reconstruct raw items and report where the header and footer were seen
    pub fn reconstruct_with_report(&self, lines: &[RawTextLine]) -> Reconstruction {
        let mut report = Reconstruction::default();
        let mut state = ReconstructorState::SeekingHeader;
        let mut pending = PendingLineItem::default();

        let start = match lines.iter().position(|l| self.is_header(&l.text)) {
            Some(idx) => {
                report.header_at = Some((lines[idx].page, lines[idx].line));
                idx + 1
            }
            None => {
                warn!(lines = lines.len(), "No column header found, reading from first line");
                0
            }
        };
        state = transition(state, ReconstructorState::Buffering);

        for line in &lines[start..] {
            match self.step(&mut pending, &line.text) {
                Step::Skip | Step::Buffer => {}
                Step::Emit(item) => report.items.push(item),
                Step::Discard => report.discarded_items += 1,
                Step::Stop => {
                    report.footer_at = Some((line.page, line.line));
                    state = transition(state, ReconstructorState::Stopped);
                    break;
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                ?state,
                lines = pending.lines.len(),
                "Discarding description lines with no terminating price"
            );
            report.discarded_lines = pending.lines.len();
        }

        report
    }

    fn step(&self, pending: &mut PendingLineItem, raw: &str) -> Step {
        if raw.trim().is_empty() {
            return Step::Skip;
        }

        if self.is_footer(raw) {
            return Step::Stop;
        }

        // Page headers repeat on continuation pages
        if self.is_header(raw) {
            trace!(line = raw, "Skipping repeated column header");
            return Step::Skip;
        }

        let text = match FILLER_RUN.find(raw) {
            Some(run) => {
                let kept = raw[..run.start()].trim_end();
                if kept.trim().is_empty() {
                    return Step::Skip;
                }
                kept
            }
            None => raw,
        };

        let Some((fragment, price)) = split_price(text) else {
            pending.push(text);
            return Step::Buffer;
        };

        let fragment = strip_trailing_codes(fragment);
        let description = clean_description(&pending.take_with(&fragment));

        if description.is_empty() {
            debug!(%price, "Price line without description, discarding");
            return Step::Discard;
        }

        trace!(description = %description, %price, "Reconstructed line item");
        Step::Emit(RawItem::new(description, price))
    }
}

fn transition(from: ReconstructorState, to: ReconstructorState) -> ReconstructorState {
    trace!(?from, ?to, "Reconstructor transition");
    to
}

/// Split a line into its description fragment and trailing price
fn split_price(text: &str) -> Option<(&str, BigDecimal)> {
    let captures = TRAILING_PRICE.captures(text)?;
    let matched = captures.get(1)?;
    let digits: String = matched
        .as_str()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let price = BigDecimal::from_str(&digits).ok()?;
    Some((text[..matched.start()].trim_end(), price))
}
