//! Source registry for the rate fallback chain.
//!
//! The registry owns the configured sources and runs one lookup at a time:
//! - Sources are tried strictly in registration order
//! - Each rate is validated before it is accepted
//! - Every attempt is recorded, and reported when the query asks for it
//! - No source is retried within a lookup

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};

use super::{DebugReporter, RateValidator};
use crate::config::SourceConfig;
use crate::errors::RateError;
use crate::models::{AttemptRecord, RateQuery, RateResult, SourceId, SourceKind, SourceRate};
use crate::provider::sbv_portal::ChromiumBrowser;
use crate::provider::{
    ExchangeRateApiSource, RateSource, SbvPortalSource, VietcombankJsonSource,
    VietcombankXmlSource,
};

/// Progress of one lookup through the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchState {
    NotStarted,
    TryingSource(usize),
    Succeeded,
    ExhaustedAllSources,
}

impl FetchState {
    /// Move past the current source after it failed (or start the chain).
    fn advance(self, source_count: usize) -> Self {
        let next = match self {
            Self::NotStarted => 0,
            Self::TryingSource(i) => i + 1,
            terminal => return terminal,
        };
        if next < source_count {
            Self::TryingSource(next)
        } else {
            Self::ExhaustedAllSources
        }
    }
}

/// Ordered chain of rate sources.
pub struct SourceRegistry {
    sources: Vec<Arc<dyn RateSource>>,
    validator: RateValidator,
}

impl SourceRegistry {
    /// Create a registry with the default validator.
    pub fn new(sources: Vec<Arc<dyn RateSource>>) -> Self {
        Self {
            sources,
            validator: RateValidator::new(),
        }
    }

    pub fn with_validator(sources: Vec<Arc<dyn RateSource>>, validator: RateValidator) -> Self {
        Self { sources, validator }
    }

    /// Build the sources selected by `config`, in its order.
    pub fn from_config(config: &SourceConfig) -> Self {
        let sources = config
            .sources
            .kinds()
            .into_iter()
            .map(|kind| build_source(kind, config))
            .collect();

        Self::with_validator(sources, RateValidator::with_range(config.range))
    }

    /// Source identifiers in priority order.
    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Validate `date` and run the chain.
    ///
    /// The only error is an invalid date, returned before any source runs.
    /// A lookup where every source fails is an `Ok` result without a rate.
    pub async fn get_rate(
        &self,
        date: &str,
        debug: bool,
        reporter: &dyn DebugReporter,
    ) -> Result<RateResult, RateError> {
        let query = RateQuery::parse(date, debug)?;
        Ok(self.fetch_rate(&query, reporter).await)
    }

    /// Run the chain for an already validated query.
    pub async fn fetch_rate(&self, query: &RateQuery, reporter: &dyn DebugReporter) -> RateResult {
        let source_count = self.sources.len();
        let mut trace = Vec::with_capacity(source_count);
        let mut winner: Option<(usize, SourceRate)> = None;

        let mut state = FetchState::NotStarted.advance(source_count);
        while let FetchState::TryingSource(i) = state {
            let source = &self.sources[i];
            let source_id: SourceId = Cow::Borrowed(source.id());

            info!(
                "Fetching USD-VND rate for {} from '{}' ({}/{})",
                query.date,
                source_id,
                i + 1,
                source_count
            );

            let started = Instant::now();
            let (outcome, pages) = source
                .fetch_rate_with_pages(&query.date, query.debug)
                .await;
            let outcome = outcome.and_then(|rate| {
                self.validator
                    .validate(&rate, &query.date)
                    .map(|()| rate)
            });
            let elapsed = started.elapsed();

            let record = match outcome {
                Ok(rate) => {
                    info!(
                        "Source '{}' returned {} ({})",
                        source_id,
                        rate.rate,
                        source.authority()
                    );
                    let record = AttemptRecord::success(source_id, rate.raw.clone(), elapsed);
                    winner = Some((i, rate));
                    state = FetchState::Succeeded;
                    record
                }
                Err(e) => {
                    warn!("Source '{}' failed: {}, trying next source", source_id, e);
                    state = state.advance(source_count);
                    AttemptRecord::failure(source_id, e, elapsed)
                }
            }
            .with_pages(pages);

            if query.debug {
                reporter.on_attempt(query, &record);
            }
            trace.push(record);
        }
        debug!("Lookup for {} finished in state {:?}", query.date, state);

        match (state, winner) {
            (FetchState::Succeeded, Some((i, rate))) => {
                let source = &self.sources[i];
                RateResult {
                    date: query.date,
                    rate: Some(rate.rate),
                    source: Some(Cow::Borrowed(source.id())),
                    authority: Some(source.authority()),
                    as_of: rate.as_of,
                    trace,
                }
            }
            _ => {
                let result = RateResult::not_found(query.date, trace);
                warn!(
                    "No USD-VND rate found for {}: {}",
                    query.date,
                    result.summary()
                );
                result
            }
        }
    }
}

fn build_source(kind: SourceKind, config: &SourceConfig) -> Arc<dyn RateSource> {
    match kind {
        SourceKind::SbvPortal => {
            let browser = ChromiumBrowser::new(config.chromium_path.clone(), config.http_timeout);
            Arc::new(SbvPortalSource::new(
                Arc::new(browser),
                config.portal_url.clone(),
                config.portal_timeout,
                config.range,
            ))
        }
        SourceKind::BankXml => Arc::new(VietcombankXmlSource::new(
            config.bank_xml_url.clone(),
            config.http_timeout,
        )),
        SourceKind::BankJson => Arc::new(VietcombankJsonSource::new(
            config.bank_json_url.clone(),
            config.http_timeout,
        )),
        SourceKind::International => Arc::new(ExchangeRateApiSource::new(
            config.international_url.clone(),
            config.http_timeout,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSet;
    use crate::errors::SourceError;
    use crate::models::{Authority, PageSnapshot, RateDate};
    use crate::registry::{FnReporter, NoopReporter};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockSource {
        id: &'static str,
        kind: SourceKind,
        authority: Authority,
        call_count: AtomicUsize,
        outcome: Result<SourceRate, SourceError>,
        pages: Vec<PageSnapshot>,
    }

    impl MockSource {
        fn new(
            id: &'static str,
            kind: SourceKind,
            outcome: Result<SourceRate, SourceError>,
        ) -> Arc<Self> {
            Self::with_pages(id, kind, outcome, vec![])
        }

        fn with_pages(
            id: &'static str,
            kind: SourceKind,
            outcome: Result<SourceRate, SourceError>,
            pages: Vec<PageSnapshot>,
        ) -> Arc<Self> {
            let authority = match kind {
                SourceKind::SbvPortal => Authority::Official,
                SourceKind::BankXml | SourceKind::BankJson => Authority::Bank,
                SourceKind::International => Authority::Indicative,
            };
            Arc::new(Self {
                id,
                kind,
                authority,
                call_count: AtomicUsize::new(0),
                outcome,
                pages,
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for MockSource {
        fn id(&self) -> &'static str {
            self.id
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }

        fn authority(&self) -> Authority {
            self.authority
        }

        async fn fetch_rate(&self, _date: &RateDate) -> Result<SourceRate, SourceError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }

        async fn fetch_rate_with_pages(
            &self,
            date: &RateDate,
            capture_pages: bool,
        ) -> (Result<SourceRate, SourceError>, Vec<PageSnapshot>) {
            let pages = if capture_pages {
                self.pages.clone()
            } else {
                vec![]
            };
            (self.fetch_rate(date).await, pages)
        }
    }

    fn registry(sources: &[Arc<MockSource>]) -> SourceRegistry {
        SourceRegistry::new(
            sources
                .iter()
                .map(|s| s.clone() as Arc<dyn RateSource>)
                .collect(),
        )
    }

    fn portal(outcome: Result<SourceRate, SourceError>) -> Arc<MockSource> {
        MockSource::new("SBV_PORTAL", SourceKind::SbvPortal, outcome)
    }

    fn bank_xml(outcome: Result<SourceRate, SourceError>) -> Arc<MockSource> {
        MockSource::new("VCB_XML", SourceKind::BankXml, outcome)
    }

    fn bank_json(outcome: Result<SourceRate, SourceError>) -> Arc<MockSource> {
        MockSource::new("VCB_JSON", SourceKind::BankJson, outcome)
    }

    fn international(outcome: Result<SourceRate, SourceError>) -> Arc<MockSource> {
        MockSource::new("EXCHANGE_RATE_API", SourceKind::International, outcome)
    }

    fn no_result() -> SourceError {
        SourceError::NoResultForDate {
            date: "01/09/2023".to_string(),
        }
    }

    #[test]
    fn test_fetch_state_transitions() {
        assert_eq!(FetchState::NotStarted.advance(2), FetchState::TryingSource(0));
        assert_eq!(
            FetchState::TryingSource(0).advance(2),
            FetchState::TryingSource(1)
        );
        assert_eq!(
            FetchState::TryingSource(1).advance(2),
            FetchState::ExhaustedAllSources
        );
        assert_eq!(
            FetchState::NotStarted.advance(0),
            FetchState::ExhaustedAllSources
        );
        assert_eq!(FetchState::Succeeded.advance(2), FetchState::Succeeded);
    }

    #[tokio::test]
    async fn test_portal_success_stops_the_chain() {
        let sources = [
            portal(Ok(SourceRate::new(dec!(23977)).with_raw("23.977"))),
            bank_xml(Ok(SourceRate::new(dec!(23980)))),
        ];
        let result = registry(&sources)
            .get_rate("2023-09-01", false, &NoopReporter)
            .await
            .unwrap();

        assert_eq!(result.rate, Some(dec!(23977)));
        assert_eq!(result.source.as_deref(), Some("SBV_PORTAL"));
        assert_eq!(result.authority, Some(Authority::Official));
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].raw.as_deref(), Some("23.977"));
        assert_eq!(sources[1].calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_bank_xml_when_portal_has_no_result() {
        let sources = [
            portal(Err(no_result())),
            bank_xml(Ok(SourceRate::new(dec!(23980)))),
            bank_json(Ok(SourceRate::new(dec!(23990)))),
            international(Ok(SourceRate::new(dec!(24045)))),
        ];
        let result = registry(&sources)
            .get_rate("2023-09-01", false, &NoopReporter)
            .await
            .unwrap();

        assert_eq!(result.rate, Some(dec!(23980)));
        assert_eq!(result.source.as_deref(), Some("VCB_XML"));
        assert_eq!(result.authority, Some(Authority::Bank));
        assert_eq!(result.trace.len(), 2);
        assert_eq!(result.trace[0].source, "SBV_PORTAL");
        assert_eq!(result.trace[0].error, Some(no_result()));
        assert!(result.trace[1].is_success());
        assert_eq!(sources[2].calls(), 0);
        assert_eq!(sources[3].calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_date_contacts_no_source() {
        let sources = [
            portal(Ok(SourceRate::new(dec!(23977)))),
            bank_xml(Ok(SourceRate::new(dec!(23980)))),
        ];
        let result = registry(&sources)
            .get_rate("2023-02-30", true, &NoopReporter)
            .await;

        assert!(matches!(result, Err(RateError::InvalidDate(_))));
        assert!(sources.iter().all(|s| s.calls() == 0));
    }

    #[tokio::test]
    async fn test_all_sources_failing_returns_full_trace() {
        let sources = [
            portal(Err(SourceError::Timeout {
                after: Duration::from_secs(120),
            })),
            bank_xml(Err(SourceError::HttpFailure {
                status: Some(503),
                message: "Service Unavailable".to_string(),
            })),
            bank_json(Err(SourceError::parse("no USD entry in response"))),
            international(Err(SourceError::HttpFailure {
                status: None,
                message: "dns error".to_string(),
            })),
        ];
        let result = registry(&sources)
            .get_rate("2023-09-01", false, &NoopReporter)
            .await
            .unwrap();

        assert!(!result.is_found());
        assert_eq!(result.source, None);
        assert_eq!(result.trace.len(), 4);

        let order: Vec<&str> = result.trace.iter().map(|a| a.source.as_ref()).collect();
        assert_eq!(
            order,
            vec!["SBV_PORTAL", "VCB_XML", "VCB_JSON", "EXCHANGE_RATE_API"]
        );

        let mut reasons: Vec<String> = result.trace.iter().map(|a| a.reason()).collect();
        reasons.sort();
        reasons.dedup();
        assert_eq!(reasons.len(), 4);
        assert!(sources.iter().all(|s| s.calls() == 1));
    }

    #[tokio::test]
    async fn test_implausible_rate_moves_to_next_source() {
        let sources = [
            bank_xml(Ok(SourceRate::new(dec!(23.98)))),
            international(Ok(SourceRate::new(dec!(24045.5)))),
        ];
        let result = registry(&sources)
            .get_rate("2023-09-01", false, &NoopReporter)
            .await
            .unwrap();

        assert_eq!(result.rate, Some(dec!(24045.5)));
        assert_eq!(result.authority, Some(Authority::Indicative));
        assert_eq!(
            result.trace[0].error,
            Some(SourceError::ImplausibleRate { rate: dec!(23.98) })
        );
        assert_eq!(result.trace[0].raw.as_deref(), Some("23.98"));
    }

    #[tokio::test]
    async fn test_reporter_sees_each_attempt_only_in_debug() {
        let sources = [
            portal(Err(no_result())),
            bank_xml(Ok(SourceRate::new(dec!(23980)))),
        ];
        let registry = registry(&sources);
        let seen = Mutex::new(Vec::new());
        let reporter = FnReporter(|_: &RateQuery, record: &AttemptRecord| {
            seen.lock().unwrap().push(record.source.to_string());
        });

        registry
            .get_rate("2023-09-01", false, &reporter)
            .await
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());

        registry
            .get_rate("2023-09-01", true, &reporter)
            .await
            .unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["SBV_PORTAL".to_string(), "VCB_XML".to_string()]
        );
    }

    #[tokio::test]
    async fn test_debug_attempt_carries_captured_pages() {
        let detail = PageSnapshot {
            step: "detail",
            html: "<p>Đang tải...</p>".to_string(),
        };
        let sources = [
            MockSource::with_pages(
                "SBV_PORTAL",
                SourceKind::SbvPortal,
                Err(SourceError::ExtractionFailure { rejected: vec![] }),
                vec![detail.clone()],
            ),
            bank_xml(Ok(SourceRate::new(dec!(23980)))),
        ];
        let registry = registry(&sources);
        let reported = Mutex::new(Vec::new());
        let reporter = FnReporter(|_: &RateQuery, record: &AttemptRecord| {
            reported.lock().unwrap().push(record.pages.clone());
        });

        let result = registry
            .get_rate("2023-09-01", true, &reporter)
            .await
            .unwrap();
        assert_eq!(result.trace[0].pages, vec![detail.clone()]);
        assert_eq!(*reported.lock().unwrap(), vec![vec![detail], vec![]]);

        let result = registry
            .get_rate("2023-09-01", false, &reporter)
            .await
            .unwrap();
        assert!(result.trace[0].pages.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_queries_are_independent() {
        let sources = [portal(Err(no_result())), bank_xml(Ok(SourceRate::new(dec!(23980))))];
        let registry = registry(&sources);

        let first = registry.get_rate("2023-09-01", false, &NoopReporter).await.unwrap();
        let second = registry.get_rate("2023-09-01", false, &NoopReporter).await.unwrap();

        assert_eq!(first.trace.len(), second.trace.len());
        assert_eq!(first.rate, second.rate);
        assert_eq!(sources[0].calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_registry_finds_nothing() {
        let result = SourceRegistry::new(vec![])
            .get_rate("2023-09-01", false, &NoopReporter)
            .await
            .unwrap();
        assert!(!result.is_found());
        assert!(result.trace.is_empty());
    }

    #[test]
    fn test_from_config_respects_source_set() {
        let config = SourceConfig::default().with_sources(SourceSet::PortalOnly);
        assert_eq!(SourceRegistry::from_config(&config).source_ids(), vec!["SBV_PORTAL"]);

        let config = SourceConfig::default();
        assert_eq!(
            SourceRegistry::from_config(&config).source_ids(),
            vec!["SBV_PORTAL", "VCB_XML", "VCB_JSON", "EXCHANGE_RATE_API"]
        );

        let config = SourceConfig::default().with_sources("intl,xml".parse().unwrap());
        assert_eq!(
            SourceRegistry::from_config(&config).source_ids(),
            vec!["EXCHANGE_RATE_API", "VCB_XML"]
        );
    }
}
