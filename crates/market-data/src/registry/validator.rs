//! Rate validation.
//!
//! Validates rates returned by sources before the registry accepts them:
//! - Strictly positive
//! - Inside the plausible VND-per-USD range
//! - Soft warning when a source reports a different effective date

use log::warn;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::SourceError;
use crate::models::{RateDate, SourceRate};

/// Expected bounds for a VND-per-USD rate, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlausibleRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PlausibleRange {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: Decimal) -> bool {
        value > Decimal::ZERO && value >= self.min && value <= self.max
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        Self {
            min: Decimal::from(15_000),
            max: Decimal::from(35_000),
        }
    }
}

/// Source rate validator.
#[derive(Clone, Debug, Default)]
pub struct RateValidator {
    range: PlausibleRange,
}

impl RateValidator {
    /// Create a new validator with the default range.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with a custom range.
    pub fn with_range(range: PlausibleRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> PlausibleRange {
        self.range
    }

    /// Validate a source rate for the requested date.
    ///
    /// Returns Ok(()) if the rate is usable. A mismatched effective date is
    /// logged but does not cause rejection: bank and international feeds
    /// only publish their latest rate.
    pub fn validate(&self, rate: &SourceRate, date: &RateDate) -> Result<(), SourceError> {
        if !self.range.contains(rate.rate) {
            return Err(SourceError::ImplausibleRate { rate: rate.rate });
        }

        if let Some(as_of) = rate.as_of {
            if as_of != date.naive() {
                warn!(
                    "Rate {} is effective {} but {} was requested",
                    rate.rate, as_of, date
                );
            }
        }

        Ok(())
    }
}
