//! Rate source trait definitions.
//!
//! This module defines the core `RateSource` trait that every source in the
//! fallback chain implements.

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::models::{Authority, PageSnapshot, RateDate, SourceKind, SourceRate};

/// Trait for USD-VND rate sources.
///
/// Implement this trait to add a new source to the fallback chain. The
/// registry tries sources in the order they were registered and never calls
/// the same source twice within one lookup.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use sbv_rate_market_data::provider::RateSource;
///
/// struct FixedSource;
///
/// #[async_trait]
/// impl RateSource for FixedSource {
///     fn id(&self) -> &'static str {
///         "FIXED"
///     }
///
///     fn kind(&self) -> SourceKind {
///         SourceKind::International
///     }
///
///     fn authority(&self) -> Authority {
///         Authority::Indicative
///     }
///
///     async fn fetch_rate(&self, _date: &RateDate) -> Result<SourceRate, SourceError> {
///         Ok(SourceRate::new(dec!(24000)))
///     }
/// }
/// ```
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Unique identifier for this source.
    ///
    /// Should be a constant string like "SBV_PORTAL", "VCB_XML", etc.
    /// Used in the attempt trace and in logs.
    fn id(&self) -> &'static str;

    /// Which source variant this is.
    fn kind(&self) -> SourceKind;

    /// How authoritative this source's rate is.
    fn authority(&self) -> Authority;

    /// Fetch the USD-VND rate for a date.
    ///
    /// Must apply its own bounded timeout and return every failure as a
    /// `SourceError`; the registry moves on to the next source on any error.
    async fn fetch_rate(&self, date: &RateDate) -> Result<SourceRate, SourceError>;

    /// Fetch the rate, also returning the pages seen on the way when
    /// `capture_pages` is set.
    ///
    /// Only sources that render pages have anything to capture; the default
    /// returns none.
    async fn fetch_rate_with_pages(
        &self,
        date: &RateDate,
        capture_pages: bool,
    ) -> (Result<SourceRate, SourceError>, Vec<PageSnapshot>) {
        let _ = capture_pages;
        (self.fetch_rate(date).await, Vec::new())
    }
}
