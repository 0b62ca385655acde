//! Configuration module for PageMirror
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pagemirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Asset workers: {}", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CleanMode, Config, CrawlerConfig, FilterConfig, ScheduleConfig, SiteConfig, UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
