//! Rate extraction from rendered portal pages.
//!
//! The SBV result page has no stable markup, so extraction applies an ordered
//! list of heuristics and returns the first plausible hit:
//!
//! 1. [`Heuristic::TableCell`] - a table about the central rate with a row
//!    labelled USD
//! 2. [`Heuristic::PhraseRegex`] - a number next to `1 USD =`, the central
//!    rate phrase, or a trailing `VND`
//! 3. [`Heuristic::MagnitudeScan`] - every number on the page, keeping the
//!    median of the plausible ones
//!
//! Numbers follow the Vietnamese convention handled by [`parse_vn_number`].

mod number;

pub use number::parse_vn_number;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;

use crate::errors::SourceError;
use crate::models::RateDate;
use crate::registry::PlausibleRange;
use number::{NUMBER_PATTERN, NUMBER_TOKEN};

/// Characters scanned after the target date or a rate phrase.
const DATE_WINDOW_CHARS: usize = 500;
const PHRASE_WINDOW_CHARS: usize = 120;

/// Rejected tokens kept for diagnostics.
const MAX_REJECTED: usize = 20;

lazy_static! {
    static ref RATE_ANCHORS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b1\s*(?:USD|Đô\s*la\s*Mỹ|US\s*Dollars?)\s*=").unwrap(),
        Regex::new(r"(?i)tỷ\s*giá\s*trung\s*tâm|ty\s*gia\s*trung\s*tam|central\s+(?:exchange\s+)?rate")
            .unwrap(),
    ];
    static ref VND_SUFFIX: Regex =
        Regex::new(&format!(r"(?i)({})\s*(?:VND|VNĐ|đồng)\b", NUMBER_PATTERN)).unwrap();
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref ROW: Selector = Selector::parse("tr").unwrap();
    static ref CELL: Selector = Selector::parse("td, th").unwrap();
}

/// One extraction heuristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    TableCell,
    PhraseRegex,
    MagnitudeScan,
}

impl Heuristic {
    pub const DEFAULT_ORDER: [Heuristic; 3] = [
        Heuristic::TableCell,
        Heuristic::PhraseRegex,
        Heuristic::MagnitudeScan,
    ];
}

/// A rate found on a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub rate: Decimal,
    /// The token as printed on the page.
    pub raw: String,
    pub heuristic: Heuristic,
}

/// Ordered set of parsing heuristics bounded by a plausible range.
#[derive(Clone, Debug)]
pub struct ExtractionStrategy {
    range: PlausibleRange,
    heuristics: Vec<Heuristic>,
}

impl ExtractionStrategy {
    pub fn new(range: PlausibleRange) -> Self {
        Self {
            range,
            heuristics: Heuristic::DEFAULT_ORDER.to_vec(),
        }
    }

    pub fn with_heuristics(range: PlausibleRange, heuristics: Vec<Heuristic>) -> Self {
        Self { range, heuristics }
    }

    /// Extract the USD rate from a rendered HTML page.
    ///
    /// `date` narrows the phrase search to the text following that date when
    /// the page prints it. Never returns a value outside the plausible range.
    pub fn extract(&self, html: &str, date: Option<&RateDate>) -> Result<Extraction, SourceError> {
        let page = Page::parse(html);
        let mut rejected = Rejected::default();

        for heuristic in &self.heuristics {
            let hit = match heuristic {
                Heuristic::TableCell => self.table_cell(&page, &mut rejected),
                Heuristic::PhraseRegex => self.phrase_regex(&page, date, &mut rejected),
                Heuristic::MagnitudeScan => self.magnitude_scan(&page, &mut rejected),
            };

            if let Some((rate, raw)) = hit {
                debug!("Extracted {} ({}) via {:?}", rate, raw, heuristic);
                return Ok(Extraction {
                    rate,
                    raw,
                    heuristic: *heuristic,
                });
            }
            debug!("Heuristic {:?} found nothing plausible", heuristic);
        }

        Err(SourceError::ExtractionFailure {
            rejected: rejected.into_vec(),
        })
    }

    fn table_cell(&self, page: &Page, rejected: &mut Rejected) -> Option<(Decimal, String)> {
        for table in page.document.select(&TABLE) {
            if !mentions_central_rate(&visible_text(table)) {
                continue;
            }

            for row in table.select(&ROW) {
                let cells: Vec<String> = row.select(&CELL).map(visible_text).collect();
                let Some(usd_at) = cells.iter().position(|c| mentions_usd(c)) else {
                    continue;
                };

                for cell in &cells[usd_at..] {
                    if let Some(hit) = self.first_plausible(cell, rejected) {
                        return Some(hit);
                    }
                }
            }
        }
        None
    }

    fn phrase_regex(
        &self,
        page: &Page,
        date: Option<&RateDate>,
        rejected: &mut Rejected,
    ) -> Option<(Decimal, String)> {
        let after_date = date.and_then(|d| {
            let needle = d.portal_format();
            page.text
                .find(&needle)
                .map(|pos| window(&page.text[pos + needle.len()..], DATE_WINDOW_CHARS))
        });

        for text in after_date.iter().map(String::as_str).chain([page.text.as_str()]) {
            for anchor in RATE_ANCHORS.iter() {
                for m in anchor.find_iter(text) {
                    let following = window(&text[m.end()..], PHRASE_WINDOW_CHARS);
                    if let Some(hit) = self.first_plausible(&following, rejected) {
                        return Some(hit);
                    }
                }
            }

            for caps in VND_SUFFIX.captures_iter(text) {
                let token = &caps[1];
                if let Some(hit) = self.check(token, rejected) {
                    return Some(hit);
                }
            }
        }
        None
    }

    fn magnitude_scan(&self, page: &Page, rejected: &mut Rejected) -> Option<(Decimal, String)> {
        let mut candidates: Vec<(Decimal, String)> = NUMBER_TOKEN
            .find_iter(&page.text)
            .filter_map(|m| self.check(m.as_str(), rejected))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let seen = candidates.len();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        let median = candidates.swap_remove(seen / 2);
        if seen > 1 {
            debug!(
                "Magnitude scan saw {} plausible values, using median {}",
                seen, median.0
            );
        }
        Some(median)
    }

    fn first_plausible(&self, text: &str, rejected: &mut Rejected) -> Option<(Decimal, String)> {
        NUMBER_TOKEN
            .find_iter(text)
            .find_map(|m| self.check(m.as_str(), rejected))
    }

    fn check(&self, token: &str, rejected: &mut Rejected) -> Option<(Decimal, String)> {
        let value = parse_vn_number(token)?;
        if self.range.contains(value) {
            Some((value, token.to_string()))
        } else {
            rejected.push(token);
            None
        }
    }
}

/// Parsed document plus its visible text, whitespace-collapsed.
struct Page {
    document: Html,
    text: String,
}

impl Page {
    fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = visible_text(document.root_element());
        Self { document, text }
    }
}

#[derive(Default)]
struct Rejected(Vec<String>);

impl Rejected {
    fn push(&mut self, token: &str) {
        if self.0.len() < MAX_REJECTED && !self.0.iter().any(|t| t == token) {
            self.0.push(token.to_string());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Text content of an element, skipping scripts and styles.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => parts.push(&**text),
            Node::Element(el) if matches!(el.name(), "script" | "style" | "noscript") => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, parts);
                }
            }
            _ => {}
        }
    }
}

fn window(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

fn mentions_usd(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.contains("USD") || lower.contains("đô la mỹ") || lower.contains("us dollar")
}

fn mentions_central_rate(text: &str) -> bool {
    RATE_ANCHORS[1].is_match(text)
}
