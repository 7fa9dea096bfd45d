//! State Bank of Vietnam central rate portal.
//!
//! The only source that publishes the official central rate. The lookup
//! follows the portal's own search form:
//!
//! 1. Load `TyGiaTrungTam.jspx`
//! 2. Switch the search mode to "by data table"
//! 3. Fill both the from and to dates with the requested day
//! 4. Submit and find the result row for that day
//! 5. Follow its "Xem" link and extract the rate from the detail page
//!
//! Debug lookups also keep the last HTML seen at the results and detail
//! steps, so a failed extraction can be inspected afterwards.

mod browser;
mod chromium;

pub use browser::{BrowserError, PortalBrowser, PortalSession};
pub use chromium::{find_chromium, ChromiumBrowser};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use tokio::time::{sleep, Instant};

use crate::errors::SourceError;
use crate::extraction::ExtractionStrategy;
use crate::models::{Authority, PageSnapshot, RateDate, SourceKind, SourceRate};
use crate::provider::RateSource;
use crate::registry::PlausibleRange;

const SOURCE_ID: &str = "SBV_PORTAL";

const SEARCH_MODE_RADIO: &str = r#"[id="pt1:r2:0:loaiTimKiem:_1"]"#;
const FROM_DATE_INPUT: &str = r#"[id="pt1:r2:0:id1::content"]"#;
const TO_DATE_INPUT: &str = r#"[id="pt1:r2:0:id4::content"]"#;
const SEARCH_BUTTON: &str = r#"[id="pt1:r2:0:cb1"]"#;

const VIEW_BUTTON: &str = "a.button-view";
const ANY_LINK: &str = "a";
const VIEW_LABELS: [&str; 2] = ["xem", "view"];

lazy_static! {
    static ref VIEW_BUTTON_SELECTOR: Selector = Selector::parse(VIEW_BUTTON).unwrap();
    static ref ANY_LINK_SELECTOR: Selector = Selector::parse(ANY_LINK).unwrap();
}

/// Wait budgets inside one portal lookup.
#[derive(Clone, Copy, Debug)]
pub struct PortalTimings {
    /// How long to wait for each form element.
    pub element_wait: Duration,
    /// How long to wait for the results table, and then the detail page.
    pub results_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for PortalTimings {
    fn default() -> Self {
        Self {
            element_wait: Duration::from_secs(20),
            results_wait: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Last page seen at each step, kept only when enabled.
struct PageLog {
    enabled: bool,
    pages: Vec<PageSnapshot>,
}

impl PageLog {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pages: Vec::new(),
        }
    }

    fn record(&mut self, step: &'static str, html: &str) {
        if !self.enabled {
            return;
        }
        match self.pages.iter_mut().find(|p| p.step == step) {
            Some(page) => page.html = html.to_string(),
            None => self.pages.push(PageSnapshot {
                step,
                html: html.to_string(),
            }),
        }
    }
}

/// Official portal source.
pub struct SbvPortalSource {
    browser: Arc<dyn PortalBrowser>,
    url: String,
    timeout: Duration,
    timings: PortalTimings,
    extraction: ExtractionStrategy,
}

impl SbvPortalSource {
    /// `timeout` bounds the whole interaction, browser launch included.
    pub fn new(
        browser: Arc<dyn PortalBrowser>,
        url: impl Into<String>,
        timeout: Duration,
        range: PlausibleRange,
    ) -> Self {
        Self {
            browser,
            url: url.into(),
            timeout,
            timings: PortalTimings::default(),
            extraction: ExtractionStrategy::new(range),
        }
    }

    pub fn with_timings(mut self, timings: PortalTimings) -> Self {
        self.timings = timings;
        self
    }

    async fn run(&self, date: &RateDate, pages: &mut PageLog) -> Result<SourceRate, SourceError> {
        let started = Instant::now();
        let timed_out = || SourceError::Timeout {
            after: self.timeout,
        };

        let mut session = tokio::time::timeout(self.timeout, self.browser.open())
            .await
            .map_err(|_| timed_out())??;

        let remaining = self.timeout.saturating_sub(started.elapsed());
        let outcome =
            tokio::time::timeout(remaining, self.lookup(session.as_mut(), date, pages)).await;
        session.close().await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!("Portal lookup for {} timed out", date);
                Err(timed_out())
            }
        }
    }

    async fn lookup(
        &self,
        session: &mut dyn PortalSession,
        date: &RateDate,
        pages: &mut PageLog,
    ) -> Result<SourceRate, SourceError> {
        let portal_date = date.portal_format();

        session
            .goto(&self.url)
            .await
            .map_err(|e| SourceError::navigation("load", e.to_string()))?;

        self.require(session, SEARCH_MODE_RADIO, "search_mode").await?;
        session
            .click(SEARCH_MODE_RADIO)
            .await
            .map_err(|e| SourceError::navigation("search_mode", e.to_string()))?;

        for (input, step) in [(FROM_DATE_INPUT, "from_date"), (TO_DATE_INPUT, "to_date")] {
            self.require(session, input, step).await?;
            session
                .fill(input, &portal_date)
                .await
                .map_err(|e| SourceError::navigation(step, e.to_string()))?;
        }

        self.require(session, SEARCH_BUTTON, "search").await?;
        session
            .click(SEARCH_BUTTON)
            .await
            .map_err(|e| SourceError::navigation("search", e.to_string()))?;
        debug!("Submitted portal search for {}", portal_date);

        let (selector, index) = self.wait_for_result_link(session, date, pages).await?;
        session
            .follow(selector, index)
            .await
            .map_err(|e| SourceError::navigation("open_result", e.to_string()))?;

        self.wait_for_rate(session, date, pages).await
    }

    async fn require(
        &self,
        session: &mut dyn PortalSession,
        selector: &str,
        step: &str,
    ) -> Result<(), SourceError> {
        let present = session
            .wait_for(selector, self.timings.element_wait)
            .await
            .map_err(|e| SourceError::navigation(step, e.to_string()))?;
        if present {
            Ok(())
        } else {
            Err(SourceError::navigation(
                step,
                format!("element {} not found", selector),
            ))
        }
    }

    async fn wait_for_result_link(
        &self,
        session: &mut dyn PortalSession,
        date: &RateDate,
        pages: &mut PageLog,
    ) -> Result<(&'static str, usize), SourceError> {
        let deadline = Instant::now() + self.timings.results_wait;
        loop {
            let html = session
                .content()
                .await
                .map_err(|e| SourceError::navigation("results", e.to_string()))?;
            pages.record("results", &html);
            if let Some(link) = find_result_link(&html, date) {
                return Ok(link);
            }
            if Instant::now() >= deadline {
                return Err(SourceError::NoResultForDate {
                    date: date.portal_format(),
                });
            }
            sleep(self.timings.poll_interval).await;
        }
    }

    async fn wait_for_rate(
        &self,
        session: &mut dyn PortalSession,
        date: &RateDate,
        pages: &mut PageLog,
    ) -> Result<SourceRate, SourceError> {
        let deadline = Instant::now() + self.timings.results_wait;
        loop {
            let html = session
                .content()
                .await
                .map_err(|e| SourceError::navigation("detail", e.to_string()))?;
            pages.record("detail", &html);

            match self.extraction.extract(&html, Some(date)) {
                Ok(hit) => {
                    debug!("Portal rate {} via {:?}", hit.rate, hit.heuristic);
                    return Ok(SourceRate::new(hit.rate)
                        .with_raw(hit.raw)
                        .with_as_of(Some(date.naive())));
                }
                Err(e) if Instant::now() >= deadline => return Err(e),
                Err(_) => sleep(self.timings.poll_interval).await,
            }
        }
    }
}

#[async_trait]
impl RateSource for SbvPortalSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SbvPortal
    }

    fn authority(&self) -> Authority {
        Authority::Official
    }

    async fn fetch_rate(&self, date: &RateDate) -> Result<SourceRate, SourceError> {
        self.run(date, &mut PageLog::new(false)).await
    }

    async fn fetch_rate_with_pages(
        &self,
        date: &RateDate,
        capture_pages: bool,
    ) -> (Result<SourceRate, SourceError>, Vec<PageSnapshot>) {
        let mut pages = PageLog::new(capture_pages);
        let outcome = self.run(date, &mut pages).await;
        (outcome, pages.pages)
    }
}

/// Locate the "Xem"/"View" link in the result row for `date`.
///
/// Returns the selector and the link's index among that selector's matches,
/// preferring the portal's `a.button-view` buttons.
fn find_result_link(html: &str, date: &RateDate) -> Option<(&'static str, usize)> {
    let document = Html::parse_document(html);
    let portal_date = date.portal_format();

    [
        (VIEW_BUTTON, &*VIEW_BUTTON_SELECTOR),
        (ANY_LINK, &*ANY_LINK_SELECTOR),
    ]
    .into_iter()
    .find_map(|(name, selector)| {
        document
            .select(selector)
            .position(|link| is_view_link(link) && row_mentions(link, &portal_date))
            .map(|index| (name, index))
    })
}

fn is_view_link(link: ElementRef<'_>) -> bool {
    let label = link.text().collect::<String>().trim().to_lowercase();
    VIEW_LABELS.contains(&label.as_str())
}

fn row_mentions(link: ElementRef<'_>, portal_date: &str) -> bool {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")
        .map(|row| row.text().any(|t| t.contains(portal_date)))
        .unwrap_or(false)
}
