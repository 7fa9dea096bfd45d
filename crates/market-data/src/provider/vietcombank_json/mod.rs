//! Vietcombank JSON exchange rate API.
//!
//! Unlike the XML feed this endpoint takes a date, though it may answer with
//! the closest published day; the `Date` field says which one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::SourceError;
use crate::models::{Authority, RateDate, SourceKind, SourceRate};
use crate::provider::http::{browser_headers, expand_url, json_decimal, HttpFetcher};
use crate::provider::RateSource;

const SOURCE_ID: &str = "VCB_JSON";

#[derive(Debug, Deserialize)]
struct ExchangeRatesResponse {
    #[serde(rename = "Date", default)]
    date: Option<String>,
    #[serde(rename = "Data", default)]
    data: Vec<ExchangeRateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRateEntry {
    currency_code: String,
    #[serde(default)]
    transfer: Value,
    #[serde(default)]
    cash: Value,
    #[serde(default)]
    sell: Value,
}

/// Bank JSON API source.
pub struct VietcombankJsonSource {
    http: HttpFetcher,
    url_template: String,
}

impl VietcombankJsonSource {
    /// `url_template` may contain `{date}`, replaced with the ISO date.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: HttpFetcher::new(timeout, browser_headers("application/json")),
            url_template: url_template.into(),
        }
    }
}

#[async_trait]
impl RateSource for VietcombankJsonSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn kind(&self) -> SourceKind {
        SourceKind::BankJson
    }

    fn authority(&self) -> Authority {
        Authority::Bank
    }

    async fn fetch_rate(&self, date: &RateDate) -> Result<SourceRate, SourceError> {
        let url = expand_url(&self.url_template, &date.iso_format());
        let response: ExchangeRatesResponse = self.http.get_json(&url).await?;
        debug!(
            "Vietcombank JSON returned {} entries for {:?}",
            response.data.len(),
            response.date
        );
        select_usd(response)
    }
}

fn select_usd(response: ExchangeRatesResponse) -> Result<SourceRate, SourceError> {
    let as_of = response
        .date
        .as_deref()
        .and_then(|d| d.get(..10))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    let entry = response
        .data
        .iter()
        .find(|e| e.currency_code.trim().eq_ignore_ascii_case("USD"))
        .ok_or_else(|| SourceError::parse("no USD entry in response"))?;

    let (rate, raw) = [&entry.transfer, &entry.cash, &entry.sell]
        .into_iter()
        .find_map(json_decimal)
        .ok_or_else(|| SourceError::parse("USD entry has no usable rate"))?;

    Ok(SourceRate::new(rate).with_raw(raw).with_as_of(as_of))
}
