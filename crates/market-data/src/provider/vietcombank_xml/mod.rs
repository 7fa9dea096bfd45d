//! Vietcombank XML exchange rate feed.
//!
//! The feed lists the bank's current rates as `Exrate` elements:
//!
//! ```text
//! <ExrateList>
//!   <DateTime>9/1/2023 4:55:43 PM</DateTime>
//!   <Exrate CurrencyCode="USD" Buy="23,850.00" Transfer="23,880.00" Sell="24,220.00"/>
//! </ExrateList>
//! ```
//!
//! Only the latest rates are published; the requested date is not sent.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::errors::SourceError;
use crate::extraction::parse_vn_number;
use crate::models::{Authority, RateDate, SourceKind, SourceRate};
use crate::provider::http::{browser_headers, HttpFetcher};
use crate::provider::RateSource;

const SOURCE_ID: &str = "VCB_XML";

/// Rate attributes in order of preference.
const RATE_ATTRIBUTES: [&str; 3] = ["Central", "Transfer", "Buy"];

const DATETIME_FORMAT: &str = "%m/%d/%Y %I:%M:%S %p";

/// Bank XML feed source.
pub struct VietcombankXmlSource {
    http: HttpFetcher,
    url: String,
}

impl VietcombankXmlSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: HttpFetcher::new(timeout, browser_headers("application/xml,text/xml,*/*")),
            url: url.into(),
        }
    }
}

#[async_trait]
impl RateSource for VietcombankXmlSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn kind(&self) -> SourceKind {
        SourceKind::BankXml
    }

    fn authority(&self) -> Authority {
        Authority::Bank
    }

    async fn fetch_rate(&self, date: &RateDate) -> Result<SourceRate, SourceError> {
        debug!("Fetching Vietcombank XML feed for {}", date);
        let body = self.http.get_text(&self.url).await?;
        parse_feed(&body)
    }
}

/// Find the USD entry in the feed body.
pub(crate) fn parse_feed(xml: &str) -> Result<SourceRate, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut as_of: Option<NaiveDate> = None;
    let mut in_datetime = false;
    let mut usd: Option<SourceRate> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"DateTime" => in_datetime = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"DateTime" => in_datetime = false,
            Ok(Event::Text(t)) if in_datetime => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::parse(format!("invalid DateTime text: {}", e)))?;
                as_of = NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT)
                    .map(|dt| dt.date())
                    .ok();
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Exrate" => {
                if usd.is_none() {
                    usd = usd_rate(&e)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::parse(format!(
                    "malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    let rate = usd.ok_or_else(|| SourceError::parse("no USD entry in feed"))?;
    Ok(rate.with_as_of(as_of))
}

/// Read the preferred rate from an `Exrate` element, if it is the USD one.
fn usd_rate(element: &BytesStart<'_>) -> Result<Option<SourceRate>, SourceError> {
    let mut code = None;
    let mut values: [Option<String>; 3] = Default::default();

    for attr in element.attributes() {
        let attr = attr.map_err(|e| SourceError::parse(format!("invalid attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| SourceError::parse(format!("invalid attribute value: {}", e)))?;
        let key = attr.key.as_ref();

        if key == b"CurrencyCode" {
            code = Some(value.trim().to_string());
        } else if let Some(i) = RATE_ATTRIBUTES.iter().position(|a| a.as_bytes() == key) {
            values[i] = Some(value.trim().to_string());
        }
    }

    if code.as_deref() != Some("USD") {
        return Ok(None);
    }

    values
        .iter()
        .flatten()
        .find_map(|raw| parse_vn_number(raw).map(|rate| SourceRate::new(rate).with_raw(raw)))
        .map(Some)
        .ok_or_else(|| SourceError::parse("USD entry has no usable rate attribute"))
}
