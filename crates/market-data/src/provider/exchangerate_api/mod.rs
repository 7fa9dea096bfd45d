//! exchangerate-api.com provider.
//!
//! Market rate, not the SBV central rate. Reported with
//! [`Authority::Indicative`] and kept last in the chain.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SourceError;
use crate::models::{Authority, RateDate, SourceKind, SourceRate};
use crate::provider::http::{browser_headers, expand_url, json_decimal, HttpFetcher};
use crate::provider::RateSource;

const SOURCE_ID: &str = "EXCHANGE_RATE_API";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    date: Option<String>,
    rates: HashMap<String, Value>,
}

/// International rate API source.
pub struct ExchangeRateApiSource {
    http: HttpFetcher,
    url_template: String,
}

impl ExchangeRateApiSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: HttpFetcher::new(timeout, browser_headers("application/json")),
            url_template: url_template.into(),
        }
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn kind(&self) -> SourceKind {
        SourceKind::International
    }

    fn authority(&self) -> Authority {
        Authority::Indicative
    }

    async fn fetch_rate(&self, date: &RateDate) -> Result<SourceRate, SourceError> {
        let url = expand_url(&self.url_template, &date.iso_format());
        let response: LatestResponse = self.http.get_json(&url).await?;
        read_vnd(response)
    }
}

fn read_vnd(response: LatestResponse) -> Result<SourceRate, SourceError> {
    let value = response
        .rates
        .get("VND")
        .ok_or_else(|| SourceError::parse("no VND in rates"))?;
    let (rate, raw) =
        json_decimal(value).ok_or_else(|| SourceError::parse(format!("bad VND rate: {}", value)))?;

    let as_of = response
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(SourceRate::new(rate).with_raw(raw).with_as_of(as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_vnd_rate() {
        let body = r#"{
            "provider": "https://www.exchangerate-api.com",
            "base": "USD",
            "date": "2023-09-01",
            "time_last_updated": 1693526401,
            "rates": {"USD": 1, "EUR": 0.921, "VND": 24045.5}
        }"#;
        let rate = read_vnd(serde_json::from_str(body).unwrap()).unwrap();
        assert_eq!(rate.rate, dec!(24045.5));
        assert_eq!(rate.as_of, NaiveDate::from_ymd_opt(2023, 9, 1));
    }

    #[test]
    fn test_missing_vnd_is_parse_failure() {
        let body = r#"{"date": "2023-09-01", "rates": {"USD": 1}}"#;
        let err = read_vnd(serde_json::from_str(body).unwrap()).unwrap_err();
        assert!(matches!(err, SourceError::ParseFailure { .. }));
    }
}
