use serde::Serialize;

use super::date::RateDate;
use crate::errors::RateError;

/// Request for one rate lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RateQuery {
    pub date: RateDate,
    /// Surface every attempt to the debug reporter as it happens.
    pub debug: bool,
}

impl RateQuery {
    pub fn new(date: RateDate, debug: bool) -> Self {
        Self { date, debug }
    }

    /// Validate `date` and build a query. No source is contacted on failure.
    pub fn parse(date: &str, debug: bool) -> Result<Self, RateError> {
        Ok(Self::new(RateDate::parse(date)?, debug))
    }
}
