//! Browser seam for the portal source.
//!
//! The portal is a JSF application that only renders results after script
//! execution, so the source drives a real browser. These traits keep the
//! navigation flow independent of the engine behind it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::SourceError;

/// Failure of a single browser action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("{0}")]
    Driver(String),
}

/// Opens isolated browser sessions.
#[async_trait]
pub trait PortalBrowser: Send + Sync {
    /// Start a fresh session. Fails with `BrowserUnavailable` when no engine
    /// can be launched.
    async fn open(&self) -> Result<Box<dyn PortalSession>, SourceError>;
}

/// A single browser tab the portal flow drives.
///
/// Selectors are CSS selectors. A session is used by one lookup and must be
/// released with [`PortalSession::close`].
#[async_trait]
pub trait PortalSession: Send {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Wait until `selector` matches, returning false on timeout.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, BrowserError>;

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Replace the value of an input.
    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Click the `index`-th match of `selector`, switching to the new tab if
    /// the click opens one.
    async fn follow(&mut self, selector: &str, index: usize) -> Result<(), BrowserError>;

    /// Current rendered HTML.
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Release the tab and the engine behind it.
    async fn close(self: Box<Self>);
}
