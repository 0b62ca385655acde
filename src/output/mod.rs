//! Output module for run reports and statistics
//!
//! This module handles:
//! - The report a finished run hands to summary and export tools
//! - Recording and logging run statistics
//! - The HTML index of mirrored pages

pub mod sitemap;
pub mod stats;

pub use sitemap::{write_sitemap, SITEMAP_FILE_NAME};
pub use stats::{log_statistics, CrawlStats, StatsRecorder};

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a finished run knows about what it mirrored
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    /// Seed URL of the run
    pub seed: String,

    /// Root directory of the mirror
    pub output_root: PathBuf,

    /// Canonical URLs of visited pages, in visit order
    pub visited: Vec<String>,

    /// Visited page URL to its local file, for pages present on disk
    pub pages: BTreeMap<String, PathBuf>,

    /// Pages robots.txt did not allow
    pub skipped: Vec<String>,

    /// Canonical asset URL to local file for every stored asset
    pub assets: BTreeMap<String, PathBuf>,

    /// Disallow rules that applied to the crawler
    pub disallowed_paths: Vec<String>,

    /// True if the run stopped on a user interrupt
    pub interrupted: bool,

    pub stats: CrawlStats,
}

impl CrawlReport {
    /// Number of pages dequeued
    pub fn pages_visited(&self) -> usize {
        self.visited.len()
    }

    /// Number of assets on disk
    pub fn assets_stored(&self) -> usize {
        self.assets.len()
    }

    /// Writes the report as JSON to `path`
    pub fn write_json(&self, path: &std::path::Path) -> crate::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(crate::storage::StorageError::from)?;
        crate::storage::write_atomic_sync(path, &json)?;
        Ok(())
    }
}
