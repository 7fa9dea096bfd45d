//! Debug reporting of source attempts.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::models::{AttemptRecord, PageSnapshot, RateQuery};

/// Observer of attempts made during a lookup.
///
/// Called once per attempt, in order, and only for queries with `debug` set.
/// Reporters observe; they cannot change the outcome.
pub trait DebugReporter: Send + Sync {
    fn on_attempt(&self, query: &RateQuery, record: &AttemptRecord);
}

/// Reporter that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl DebugReporter for NoopReporter {
    fn on_attempt(&self, _query: &RateQuery, _record: &AttemptRecord) {}
}

/// Reporter that writes each attempt to the log.
///
/// Captured pages are written to `page_dir` as
/// `<date>_<source>_<step>.html` when one is set, and only counted otherwise.
#[derive(Clone, Debug, Default)]
pub struct LogReporter {
    page_dir: Option<PathBuf>,
}

impl LogReporter {
    pub fn with_page_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            page_dir: Some(dir.into()),
        }
    }

    fn save_page(
        &self,
        dir: &Path,
        query: &RateQuery,
        record: &AttemptRecord,
        page: &PageSnapshot,
    ) {
        let name = format!(
            "{}_{}_{}.html",
            query.date,
            record.source.to_lowercase(),
            page.step
        );
        let path = dir.join(name);
        let written =
            std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, &page.html));
        match written {
            Ok(()) => info!(
                "[{}] Saved {} page to {}",
                query.date,
                page.step,
                path.display()
            ),
            Err(e) => warn!(
                "Failed to save {} page to {}: {}",
                page.step,
                path.display(),
                e
            ),
        }
    }
}

impl DebugReporter for LogReporter {
    fn on_attempt(&self, query: &RateQuery, record: &AttemptRecord) {
        info!(
            "[{}] {} {} in {}ms: {}{}",
            query.date,
            record.source,
            if record.is_success() { "succeeded" } else { "failed" },
            record.elapsed.as_millis(),
            record.reason(),
            record
                .raw
                .as_deref()
                .map(|raw| format!(" (raw: {})", raw))
                .unwrap_or_default()
        );

        for page in &record.pages {
            match &self.page_dir {
                Some(dir) => self.save_page(dir, query, record, page),
                None => debug!(
                    "[{}] {} {} page: {} bytes",
                    query.date,
                    record.source,
                    page.step,
                    page.html.len()
                ),
            }
        }
    }
}

/// Adapts a closure into a reporter.
pub struct FnReporter<F>(pub F);

impl<F> DebugReporter for FnReporter<F>
where
    F: Fn(&RateQuery, &AttemptRecord) + Send + Sync,
{
    fn on_attempt(&self, query: &RateQuery, record: &AttemptRecord) {
        (self.0)(query, record)
    }
}
