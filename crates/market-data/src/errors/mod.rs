//! Error types for the rate lookup crate.
//!
//! This module provides:
//! - [`RateError`]: caller-visible errors, raised before any source is tried
//! - [`SourceError`]: per-source failures, recorded in the attempt trace and
//!   never propagated to the caller

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced directly to the caller of a rate lookup.
///
/// Everything that goes wrong while talking to a source is a [`SourceError`]
/// instead; a lookup where every source fails is a normal result with no rate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    /// The date string is malformed or names an impossible calendar day.
    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

/// Failure of a single rate source.
///
/// Every variant means "try the next source"; none of them abort the chain.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    /// An expected page element was missing or navigation failed.
    #[error("Navigation failed at {step}: {message}")]
    NavigationFailure {
        /// The portal step that failed (e.g. "load", "search")
        step: String,
        /// What went wrong
        message: String,
    },

    /// The portal search returned no row for the requested date.
    /// Weekends and public holidays have no published rate.
    #[error("No result for {date}")]
    NoResultForDate {
        /// The requested date, as shown on the portal
        date: String,
    },

    /// None of the extraction heuristics produced a plausible rate.
    #[error("Extraction failed ({} implausible candidates)", rejected.len())]
    ExtractionFailure {
        /// Numeric tokens that were found but fell outside the plausible range
        rejected: Vec<String>,
    },

    /// No browser could be located or launched.
    #[error("Browser unavailable: {message}")]
    BrowserUnavailable {
        /// Launch or lookup failure detail
        message: String,
    },

    /// Network error or non-2xx HTTP status.
    #[error("HTTP failure{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    HttpFailure {
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Error detail
        message: String,
    },

    /// The response body was malformed or had no USD entry.
    #[error("Parse failure: {message}")]
    ParseFailure {
        /// What could not be parsed
        message: String,
    },

    /// The source did not answer within its time budget.
    #[error("Timed out after {}ms", after.as_millis())]
    Timeout {
        /// The budget that was exceeded
        after: Duration,
    },

    /// The source answered with a rate outside the plausible range.
    #[error("Implausible rate: {rate}")]
    ImplausibleRate {
        /// The rejected value
        rate: Decimal,
    },
}

impl SourceError {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NavigationFailure { .. } => "navigation_failure",
            Self::NoResultForDate { .. } => "no_result_for_date",
            Self::ExtractionFailure { .. } => "extraction_failure",
            Self::BrowserUnavailable { .. } => "browser_unavailable",
            Self::HttpFailure { .. } => "http_failure",
            Self::ParseFailure { .. } => "parse_failure",
            Self::Timeout { .. } => "timeout",
            Self::ImplausibleRate { .. } => "implausible_rate",
        }
    }

    pub(crate) fn navigation(step: &str, message: impl Into<String>) -> Self {
        Self::NavigationFailure {
            step: step.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::ParseFailure {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::ParseFailure {
                message: err.to_string(),
            };
        }
        Self::HttpFailure {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
