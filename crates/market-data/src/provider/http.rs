//! Shared HTTP plumbing for the API sources.

use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::SourceError;
use crate::extraction::parse_vn_number;

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser-like headers; the bank endpoints reject bare clients.
pub(crate) fn browser_headers(accept: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.5"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// GET-only client with a fixed time budget per request.
#[derive(Clone)]
pub(crate) struct HttpFetcher {
    /// Build error text when no client with a timeout could be built.
    client: Result<Client, String>,
    timeout: Duration,
}

impl HttpFetcher {
    /// Every client carries `timeout`; a client that cannot be built turns
    /// each request into an `HttpFailure`.
    pub(crate) fn new(timeout: Duration, headers: HeaderMap) -> Self {
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .or_else(|e| {
                warn!("HTTP client with browser headers failed to build: {}", e);
                Client::builder().timeout(timeout).build()
            })
            .map_err(|e| e.to_string());

        Self { client, timeout }
    }

    /// Fetch a URL and return its body, mapping non-2xx to `HttpFailure`.
    pub(crate) async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        let client = self.client.as_ref().map_err(|e| SourceError::HttpFailure {
            status: None,
            message: format!("HTTP client unavailable: {}", e),
        })?;

        debug!("GET {}", url);
        let response = client.get(url).send().await.map_err(|e| self.map_err(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::HttpFailure {
                status: Some(status.as_u16()),
                message: format!("GET {} returned {}", url, status),
            });
        }

        response.text().await.map_err(|e| self.map_err(e))
    }

    /// Fetch a URL and decode its JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| SourceError::parse(format!("invalid JSON: {}", e)))
    }

    fn map_err(&self, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout {
                after: self.timeout,
            }
        } else {
            SourceError::from(err)
        }
    }
}

/// Substitute `{date}` in a URL template.
pub(crate) fn expand_url(template: &str, date: &str) -> String {
    template.replace("{date}", date)
}

/// Read a rate from a JSON value that may be a string ("23,860.00") or a number.
///
/// Returns the decimal and the text it was read from.
pub(crate) fn json_decimal(value: &Value) -> Option<(Decimal, String)> {
    match value {
        Value::String(s) => parse_vn_number(s).map(|d| (d, s.clone())),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .map(|d| (d, text))
        }
        _ => None,
    }
}
