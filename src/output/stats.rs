//! Run statistics
//!
//! Counters are bumped concurrently by the page loop and every asset worker,
//! then frozen into a [`CrawlStats`] snapshot for the run report.

use crate::state::PageState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Frozen counters for a finished (or interrupted) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages rewritten and written to disk
    pub pages_saved: u64,

    /// Pages answered with 304 whose prior file was reused
    pub pages_unchanged: u64,

    /// Pages that failed to fetch, parse, rewrite or persist
    pub pages_failed: u64,

    /// Pages whose response was not HTML
    pub pages_not_html: u64,

    /// Pages skipped because robots.txt disallowed them
    pub pages_skipped: u64,

    /// Assets written to disk
    pub assets_downloaded: u64,

    /// Assets answered with 304 whose prior file was reused
    pub assets_unchanged: u64,

    /// Assets rejected by the asset filter
    pub assets_filtered: u64,

    /// Assets that failed to fetch or persist
    pub assets_failed: u64,

    /// Bytes written for pages, assets and rewritten stylesheets
    pub bytes_written: u64,

    /// Page requests issued (robots-skipped pages excluded)
    pub page_requests: u64,

    /// Wall-clock duration of the run
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

/// Live counters shared across tasks
#[derive(Debug, Default)]
pub struct StatsRecorder {
    pages_saved: AtomicU64,
    pages_unchanged: AtomicU64,
    pages_failed: AtomicU64,
    pages_not_html: AtomicU64,
    pages_skipped: AtomicU64,
    assets_downloaded: AtomicU64,
    assets_unchanged: AtomicU64,
    assets_filtered: AtomicU64,
    assets_failed: AtomicU64,
    bytes_written: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a page by its terminal state
    pub fn record_page(&self, state: PageState) {
        let counter = match state {
            PageState::Persisted => &self.pages_saved,
            PageState::NotModified => &self.pages_unchanged,
            PageState::NotHtml => &self.pages_not_html,
            PageState::Errored => &self.pages_failed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn page_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_downloaded(&self) {
        self.assets_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_unchanged(&self) {
        self.assets_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_filtered(&self) {
        self.assets_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn asset_failed(&self) {
        self.assets_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, len: usize) {
        self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Freezes the counters
    pub fn snapshot(&self, page_requests: u64, elapsed: Duration) -> CrawlStats {
        CrawlStats {
            pages_saved: self.pages_saved.load(Ordering::Relaxed),
            pages_unchanged: self.pages_unchanged.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            pages_not_html: self.pages_not_html.load(Ordering::Relaxed),
            pages_skipped: self.pages_skipped.load(Ordering::Relaxed),
            assets_downloaded: self.assets_downloaded.load(Ordering::Relaxed),
            assets_unchanged: self.assets_unchanged.load(Ordering::Relaxed),
            assets_filtered: self.assets_filtered.load(Ordering::Relaxed),
            assets_failed: self.assets_failed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            page_requests,
            elapsed,
        }
    }
}

/// Logs the statistics of a run
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn log_statistics(stats: &CrawlStats) {
    tracing::info!("=== Mirror Statistics ===");
    tracing::info!(
        "Pages: {} saved, {} unchanged, {} failed, {} not HTML, {} skipped by robots.txt",
        stats.pages_saved,
        stats.pages_unchanged,
        stats.pages_failed,
        stats.pages_not_html,
        stats.pages_skipped
    );
    tracing::info!(
        "Assets: {} downloaded, {} unchanged, {} filtered, {} failed",
        stats.assets_downloaded,
        stats.assets_unchanged,
        stats.assets_filtered,
        stats.assets_failed
    );

    let secs = stats.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        stats.page_requests as f64 / secs
    } else {
        0.0
    };
    tracing::info!(
        "{} page requests, {} bytes written in {:.1}s ({:.2} pages/sec)",
        stats.page_requests,
        stats.bytes_written,
        secs,
        rate
    );
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
