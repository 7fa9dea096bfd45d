use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::date::RateDate;
use super::types::{Authority, SourceId};
use crate::errors::SourceError;

/// Rate returned by a single source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceRate {
    /// VND per 1 USD, with the digits the source printed.
    pub rate: Decimal,

    /// The text the rate was read from, when it came out of parsing.
    pub raw: Option<String>,

    /// The day the source says its rate applies to, when it says so.
    pub as_of: Option<NaiveDate>,
}

impl SourceRate {
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            raw: None,
            as_of: None,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn with_as_of(mut self, as_of: Option<NaiveDate>) -> Self {
        self.as_of = as_of;
        self
    }
}

/// Rendered HTML of one step of a browser-driven lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Step the page belongs to, such as "results" or "detail".
    pub step: &'static str,
    pub html: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Record of a single source attempt during a lookup.
#[derive(Clone, Debug, Serialize)]
pub struct AttemptRecord {
    pub source: SourceId,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SourceError>,
    /// Extracted text, when parsing was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
    /// Pages captured during a debug lookup. Reporters decide where they go.
    #[serde(skip)]
    pub pages: Vec<PageSnapshot>,
}

impl AttemptRecord {
    pub fn success(source: SourceId, raw: Option<String>, elapsed: Duration) -> Self {
        Self {
            source,
            outcome: AttemptOutcome::Success,
            error: None,
            raw,
            elapsed,
            pages: Vec::new(),
        }
    }

    pub fn failure(source: SourceId, error: SourceError, elapsed: Duration) -> Self {
        let raw = match &error {
            SourceError::ExtractionFailure { rejected } if !rejected.is_empty() => {
                Some(rejected.join(" "))
            }
            SourceError::ImplausibleRate { rate } => Some(rate.to_string()),
            _ => None,
        };
        Self {
            source,
            outcome: AttemptOutcome::Failure,
            error: Some(error),
            raw,
            elapsed,
            pages: Vec::new(),
        }
    }

    pub fn with_pages(mut self, pages: Vec<PageSnapshot>) -> Self {
        self.pages = pages;
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    /// Human-readable reason for this attempt's outcome.
    pub fn reason(&self) -> String {
        match &self.error {
            Some(err) => err.to_string(),
            None => "ok".to_string(),
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// Outcome of a rate lookup.
///
/// A missing `rate` is a normal result: every source was tried and `trace`
/// says why each one failed.
#[derive(Clone, Debug, Serialize)]
pub struct RateResult {
    pub date: RateDate,
    pub rate: Option<Decimal>,
    pub source: Option<SourceId>,
    pub authority: Option<Authority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    pub trace: Vec<AttemptRecord>,
}

impl RateResult {
    pub fn not_found(date: RateDate, trace: Vec<AttemptRecord>) -> Self {
        Self {
            date,
            rate: None,
            source: None,
            authority: None,
            as_of: None,
            trace,
        }
    }

    pub fn is_found(&self) -> bool {
        self.rate.is_some()
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.trace
            .iter()
            .map(|a| match &a.error {
                None => format!("{}: SUCCESS", a.source),
                Some(err) => format!("{}: ERROR ({})", a.source, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&SourceId, &SourceError)> {
        self.trace
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.source, e)))
            .collect()
    }
}
