use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use sbv_rate_market_data::{PlausibleRange, SourceConfig, SourceSet};

pub struct Config {
    pub source: SourceConfig,
    /// Where `--debug` lookups save the portal pages they saw.
    pub page_dir: Option<PathBuf>,
}

impl Config {
    /// Defaults overridden by `SBV_RATE_*` variables. Malformed values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        let mut source = SourceConfig::default();

        if let Some(sources) = env_parse::<SourceSet>("SBV_RATE_SOURCES") {
            source.sources = sources;
        }
        if let Some(ms) = env_parse::<u64>("SBV_RATE_HTTP_TIMEOUT_MS") {
            source.http_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("SBV_RATE_PORTAL_TIMEOUT_MS") {
            source.portal_timeout = Duration::from_millis(ms);
        }

        let min = env_parse::<Decimal>("SBV_RATE_MIN").unwrap_or(source.range.min);
        let max = env_parse::<Decimal>("SBV_RATE_MAX").unwrap_or(source.range.max);
        if min < max {
            source.range = PlausibleRange::new(min, max);
        } else {
            tracing::warn!(
                "Ignoring rate range {}..{}: minimum must be below maximum",
                min,
                max
            );
        }

        source.chromium_path = env_string("SBV_RATE_CHROMIUM_PATH").map(PathBuf::from);
        if let Some(url) = env_string("SBV_RATE_PORTAL_URL") {
            source.portal_url = url;
        }
        if let Some(url) = env_string("SBV_RATE_VCB_XML_URL") {
            source.bank_xml_url = url;
        }
        if let Some(url) = env_string("SBV_RATE_VCB_JSON_URL") {
            source.bank_json_url = url;
        }
        if let Some(url) = env_string("SBV_RATE_INTL_URL") {
            source.international_url = url;
        }

        let page_dir = env_string("SBV_RATE_PAGE_DIR").map(PathBuf::from);

        Self { source, page_dir }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
