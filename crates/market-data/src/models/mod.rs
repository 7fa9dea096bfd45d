//! Rate lookup models
//!
//! This module contains the core data types for a rate lookup:
//! - `types` - Identifiers and classifications (SourceId, SourceKind, Authority)
//! - `date` - Validated calendar date (RateDate)
//! - `query` - Per-call request (RateQuery)
//! - `result` - Lookup outcome and attempt trace (RateResult, AttemptRecord, PageSnapshot)

mod date;
mod query;
mod result;
mod types;

pub use date::RateDate;
pub use query::RateQuery;
pub use result::{AttemptOutcome, AttemptRecord, PageSnapshot, RateResult, SourceRate};
pub use types::{Authority, SourceId, SourceKind};
