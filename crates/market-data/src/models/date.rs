//! Validated lookup date.

use std::fmt;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::errors::RateError;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// A real calendar day, parsed from `YYYY-MM-DD`.
///
/// Sources need the same day in different shapes: the SBV portal and the
/// result pages use `dd/mm/yyyy`, the APIs use ISO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RateDate(NaiveDate);

impl RateDate {
    /// Parse a strict `YYYY-MM-DD` string.
    ///
    /// Rejects other separators, unpadded fields, surrounding whitespace and
    /// impossible days such as `2023-02-30`.
    pub fn parse(input: &str) -> Result<Self, RateError> {
        if !ISO_DATE.is_match(input) {
            return Err(RateError::InvalidDate(format!(
                "'{}' is not in YYYY-MM-DD format",
                input
            )));
        }

        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| RateError::InvalidDate(format!("'{}' is not a calendar date", input)))
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// `dd/mm/yyyy`, as typed into the portal and printed on its result pages.
    pub fn portal_format(&self) -> String {
        self.0.format("%d/%m/%Y").to_string()
    }

    /// `yyyy-mm-dd`, for the JSON APIs.
    pub fn iso_format(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for RateDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iso_format())
    }
}

impl Serialize for RateDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.iso_format())
    }
}
