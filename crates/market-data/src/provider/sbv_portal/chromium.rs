//! Headless Chromium session via chromiumoxide.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, warn};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::browser::{BrowserError, PortalBrowser, PortalSession};
use crate::errors::SourceError;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a click is given to open a new tab.
const NEW_TAB_WAIT: Duration = Duration::from_secs(2);

/// How long Chromium is given to exit before it is killed.
const EXIT_WAIT: Duration = Duration::from_secs(5);

const EXECUTABLE_NAMES: [&str; 3] = ["google-chrome", "chromium", "chromium-browser"];

/// Locate a Chromium binary: the configured path if it exists, else PATH.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!("Configured Chromium path {} does not exist", path.display());
    }

    EXECUTABLE_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
}

impl From<CdpError> for BrowserError {
    fn from(err: CdpError) -> Self {
        BrowserError::Driver(err.to_string())
    }
}

/// Launches a headless Chromium per session.
pub struct ChromiumBrowser {
    executable: Option<PathBuf>,
    request_timeout: Duration,
}

impl ChromiumBrowser {
    pub fn new(executable: Option<PathBuf>, request_timeout: Duration) -> Self {
        Self {
            executable,
            request_timeout,
        }
    }
}

#[async_trait]
impl PortalBrowser for ChromiumBrowser {
    async fn open(&self) -> Result<Box<dyn PortalSession>, SourceError> {
        let unavailable = |message: String| SourceError::BrowserUnavailable { message };

        let executable = find_chromium(self.executable.as_deref())
            .ok_or_else(|| unavailable("no Chromium executable found".to_string()))?;
        debug!("Launching Chromium at {}", executable.display());

        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .request_timeout(self.request_timeout)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| unavailable(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| unavailable(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(unavailable(format!("failed to open tab: {e}")));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumSession {
    async fn target_ids(&self) -> Result<Vec<TargetId>, BrowserError> {
        Ok(self
            .browser
            .pages()
            .await?
            .iter()
            .map(|p| p.target_id().clone())
            .collect())
    }

    /// Switch to a tab that was not open before the click, if one appears.
    async fn switch_to_new_tab(&mut self, before: &[TargetId]) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + NEW_TAB_WAIT;
        loop {
            let opened = self
                .browser
                .pages()
                .await?
                .into_iter()
                .find(|p| !before.contains(p.target_id()));

            if let Some(page) = opened {
                let previous = std::mem::replace(&mut self.page, page);
                let _ = previous.close().await;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PortalSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await?;
        element.type_str(text).await?;
        element.press_key("Tab").await?;
        Ok(())
    }

    async fn follow(&mut self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_elements(selector)
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{selector} #{index}")))?;

        let before = self.target_ids().await?;
        element.click().await?;

        if self.switch_to_new_tab(&before).await? {
            debug!("Result link opened a new tab");
        }
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.page.content().await?)
    }

    async fn close(self: Box<Self>) {
        let ChromiumSession {
            mut browser,
            page,
            handler_task,
        } = *self;

        let _ = page.close().await;
        shut_down(&mut browser, EXIT_WAIT).await;
        handler_task.abort();
    }
}

/// The engine process behind a session.
#[async_trait]
trait BrowserProcess: Send {
    async fn close(&mut self) -> Result<(), BrowserError>;
    async fn wait(&mut self);
    async fn kill(&mut self);
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), BrowserError> {
        Browser::close(self).await?;
        Ok(())
    }

    async fn wait(&mut self) {
        let _ = Browser::wait(self).await;
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = Browser::kill(self).await {
            warn!("Failed to kill Chromium: {}", e);
        }
    }
}

/// Ask the process to exit, killing it if the request fails or the exit
/// takes longer than `exit_wait`.
async fn shut_down(process: &mut dyn BrowserProcess, exit_wait: Duration) {
    if let Err(e) = process.close().await {
        warn!("Failed to close Chromium, killing it: {}", e);
        process.kill().await;
    }
    if tokio::time::timeout(exit_wait, process.wait()).await.is_err() {
        warn!("Chromium still running after {:?}, killing it", exit_wait);
        process.kill().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct StuckProcess {
        close_fails: bool,
        exits_after_kill: bool,
        killed: usize,
    }

    #[async_trait]
    impl BrowserProcess for StuckProcess {
        async fn close(&mut self) -> Result<(), BrowserError> {
            if self.close_fails {
                Err(BrowserError::Driver("connection closed".to_string()))
            } else {
                Ok(())
            }
        }

        async fn wait(&mut self) {
            if !(self.exits_after_kill && self.killed > 0) {
                std::future::pending::<()>().await;
            }
        }

        async fn kill(&mut self) {
            self.killed += 1;
        }
    }

    #[tokio::test]
    async fn test_failed_close_kills_process() {
        let mut process = StuckProcess {
            close_fails: true,
            exits_after_kill: true,
            ..Default::default()
        };
        shut_down(&mut process, Duration::from_millis(50)).await;
        assert_eq!(process.killed, 1);
    }

    #[tokio::test]
    async fn test_exit_wait_is_bounded() {
        let mut process = StuckProcess::default();
        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            shut_down(&mut process, Duration::from_millis(50)),
        )
        .await;
        assert!(finished.is_ok());
        assert_eq!(process.killed, 1);
    }

    #[test]
    fn test_find_chromium_ignores_missing_configured_path() {
        let missing = Path::new("/nonexistent/chromium-binary");
        let found = find_chromium(Some(missing));
        assert_ne!(found.as_deref(), Some(missing));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_open_and_read_data_url() {
        let browser = ChromiumBrowser::new(None, Duration::from_secs(30));
        let mut session = browser.open().await.expect("failed to launch");
        session
            .goto("data:text/html,<p id=\"x\">23.977</p>")
            .await
            .expect("navigation failed");
        assert!(session
            .wait_for("#x", Duration::from_secs(5))
            .await
            .unwrap());
        let html = session.content().await.unwrap();
        assert!(html.contains("23.977"));
        session.close().await;
    }
}
