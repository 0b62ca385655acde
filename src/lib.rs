//! PageMirror: an incremental offline website mirror
//!
//! This crate crawls a site from a seed URL, downloads its pages and the assets
//! they reference, rewrites HTML and CSS so the copy browses correctly from
//! disk, and keeps enough validator metadata to re-crawl with conditional GETs.

pub mod assets;
pub mod config;
pub mod crawler;
pub mod output;
pub mod recon;
pub mod robots;
pub mod schedule;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for PageMirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Reference is not fetchable: {0}")]
    NotFetchable(String),
}

/// Result type alias for PageMirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CrawlEngine;
pub use output::{CrawlReport, CrawlStats};
pub use recon::{NoopObserver, ReconObserver};
pub use schedule::run_scheduled;
pub use state::PageState;
pub use url::{CanonicalUrl, UrlResolver};
