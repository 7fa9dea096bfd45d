//! SBV Rate Market Data Crate
//!
//! This crate looks up the USD-VND central exchange rate published by the
//! State Bank of Vietnam for a given day.
//!
//! # Overview
//!
//! The official portal only renders its results in a browser and is often
//! unavailable, so a lookup walks a fallback chain:
//! - The SBV portal (official central rate, driven through headless Chromium)
//! - The Vietcombank XML feed (commercial bank rate)
//! - The Vietcombank JSON API (commercial bank rate)
//! - exchangerate-api.com (indicative market rate)
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   "2023-09-01"   |
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    RateDate      |  (validation, fails fast)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  SourceRegistry  | --> |  DebugReporter   |  (per attempt, debug only)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +--------------------+
//! |   RateSource     | --> | ExtractionStrategy |  (portal pages only)
//! +------------------+     +--------------------+
//!          |
//!          v
//! +------------------+
//! |   RateResult     |  (rate or none, plus the attempt trace)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`RateDate`] - Validated calendar day
//! - [`RateQuery`] - Date plus debug flag
//! - [`RateResult`] - Rate, winning source and attempt trace
//! - [`AttemptRecord`] - Outcome of one source attempt
//! - [`SourceConfig`] / [`SourceSet`] - Which sources to use and how

pub mod config;
pub mod errors;
pub mod extraction;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export all public types from models
pub use models::{
    AttemptOutcome, AttemptRecord, Authority, PageSnapshot, RateDate, RateQuery, RateResult,
    SourceId, SourceKind, SourceRate,
};

pub use config::{SourceConfig, SourceSet};
pub use errors::{RateError, SourceError};
pub use extraction::{parse_vn_number, ExtractionStrategy, Heuristic};
pub use provider::RateSource;
pub use registry::{
    DebugReporter, FnReporter, LogReporter, NoopReporter, PlausibleRange, RateValidator,
    SourceRegistry,
};

/// Look up the USD-VND rate for `date` (`YYYY-MM-DD`).
///
/// With `debug` set, each attempt is logged as it happens. Returns
/// `Err(RateError::InvalidDate)` before touching the network when the date is
/// invalid; otherwise always returns a result, with `rate == None` when every
/// configured source failed.
pub async fn get_rate(
    date: &str,
    debug: bool,
    config: &SourceConfig,
) -> Result<RateResult, RateError> {
    let query = RateQuery::parse(date, debug)?;
    let registry = SourceRegistry::from_config(config);
    Ok(registry.fetch_rate(&query, &LogReporter::default()).await)
}
