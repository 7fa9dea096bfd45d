//! HTTP sources against local mock servers.

use std::time::Duration;

use rust_decimal_macros::dec;
use sbv_rate_market_data::provider::{
    ExchangeRateApiSource, RateSource, VietcombankJsonSource, VietcombankXmlSource,
};
use sbv_rate_market_data::{
    Authority, NoopReporter, RateDate, SourceConfig, SourceError, SourceKind, SourceRegistry,
    SourceSet,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const XML_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ExrateList>
  <DateTime>9/1/2023 4:55:43 PM</DateTime>
  <Exrate CurrencyCode="USD" CurrencyName="US DOLLAR" Buy="23,850.00" Transfer="23,980.00" Sell="24,220.00" />
</ExrateList>"#;

const JSON_BODY: &str = r#"{
  "Count": 1,
  "Date": "2023-09-01T00:00:00",
  "Data": [{"currencyName": "US DOLLAR", "currencyCode": "USD", "cash": "23850.00", "transfer": "23880.00", "sell": "24220.00"}]
}"#;

const INTL_BODY: &str = r#"{"base": "USD", "date": "2023-09-01", "rates": {"USD": 1, "VND": 24045.5}}"#;

fn date() -> RateDate {
    RateDate::parse("2023-09-01").unwrap()
}

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn test_xml_feed_returns_usd_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pXML.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(XML_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let source = VietcombankXmlSource::new(format!("{}/pXML.aspx", server.uri()), timeout());
    let rate = source.fetch_rate(&date()).await.unwrap();

    assert_eq!(rate.rate, dec!(23980.00));
    assert_eq!(rate.raw.as_deref(), Some("23,980.00"));
}

#[tokio::test]
async fn test_xml_feed_server_error_is_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = VietcombankXmlSource::new(format!("{}/pXML.aspx", server.uri()), timeout());
    let err = source.fetch_rate(&date()).await.unwrap_err();

    match err {
        SourceError::HttpFailure { status, .. } => assert_eq!(status, Some(503)),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_xml_feed_garbage_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let source = VietcombankXmlSource::new(server.uri(), timeout());
    let err = source.fetch_rate(&date()).await.unwrap_err();
    assert_eq!(err.kind(), "parse_failure");
}

#[tokio::test]
async fn test_json_api_sends_iso_date() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/exchangerates"))
        .and(query_param("date", "2023-09-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(JSON_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let source = VietcombankJsonSource::new(
        format!("{}/api/exchangerates?date={{date}}", server.uri()),
        timeout(),
    );
    let rate = source.fetch_rate(&date()).await.unwrap();
    assert_eq!(rate.rate, dec!(23880.00));
}

#[tokio::test]
async fn test_json_api_malformed_body_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"Data\": ["))
        .mount(&server)
        .await;

    let source = VietcombankJsonSource::new(server.uri(), timeout());
    let err = source.fetch_rate(&date()).await.unwrap_err();
    assert_eq!(err.kind(), "parse_failure");
}

#[tokio::test]
async fn test_slow_server_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(INTL_BODY)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let source = ExchangeRateApiSource::new(server.uri(), Duration::from_millis(100));
    let err = source.fetch_rate(&date()).await.unwrap_err();
    assert_eq!(
        err,
        SourceError::Timeout {
            after: Duration::from_millis(100)
        }
    );
}

#[tokio::test]
async fn test_chain_over_http_falls_through_to_indicative_rate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pXML.aspx"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/exchangerates"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Data": []}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v4/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INTL_BODY))
        .mount(&server)
        .await;

    let config = SourceConfig {
        sources: SourceSet::Custom(vec![
            SourceKind::BankXml,
            SourceKind::BankJson,
            SourceKind::International,
        ]),
        http_timeout: timeout(),
        bank_xml_url: format!("{}/pXML.aspx", server.uri()),
        bank_json_url: format!("{}/api/exchangerates?date={{date}}", server.uri()),
        international_url: format!("{}/v4/latest/USD", server.uri()),
        ..SourceConfig::default()
    };

    let result = SourceRegistry::from_config(&config)
        .get_rate("2023-09-01", true, &NoopReporter)
        .await
        .unwrap();

    assert_eq!(result.rate, Some(dec!(24045.5)));
    assert_eq!(result.source.as_deref(), Some("EXCHANGE_RATE_API"));
    assert_eq!(result.authority, Some(Authority::Indicative));

    let kinds: Vec<&str> = result
        .trace
        .iter()
        .filter_map(|a| a.error.as_ref().map(|e| e.kind()))
        .collect();
    assert_eq!(kinds, vec!["http_failure", "parse_failure"]);
    assert_eq!(
        result.summary(),
        "VCB_XML: ERROR (HTTP failure (500): GET ".to_string()
            + &format!("{}/pXML.aspx returned 500 Internal Server Error", server.uri())
            + ") -> VCB_JSON: ERROR (Parse failure: no USD entry in response) -> EXCHANGE_RATE_API: SUCCESS"
    );
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_live_xml_feed() {
    let source = VietcombankXmlSource::new(
        sbv_rate_market_data::config::DEFAULT_BANK_XML_URL,
        Duration::from_secs(30),
    );
    let rate = source.fetch_rate(&date()).await.unwrap();
    assert!(rate.rate > dec!(15000));
}
