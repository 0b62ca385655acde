//! Crawler module for mirroring a site
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching with conditional requests and user-agent rotation
//! - HTML analysis and the streaming page rewrite
//! - Stylesheet reference rewriting and font inlining
//! - The exactly-once asset pipeline
//! - Politeness scheduling and overall crawl coordination

mod context;
mod coordinator;
pub mod css;
mod fetcher;
mod page;
mod parser;
mod pipeline;
mod rewrite;
mod scheduler;

pub use context::CrawlContext;
pub use coordinator::CrawlEngine;
pub use fetcher::{FetchClient, FetchError, FetchOutcome, FetchedResponse, ROTATE_EVERY, USER_AGENTS};
pub use page::{PageOutcome, PageProcessor};
pub use parser::{analyze_page, AssetRef, PageAnalysis, RefKind};
pub use pipeline::{AssetPipeline, LocalReference, MAX_CSS_DEPTH};
pub use rewrite::{rewrite_page, RewritePlan};
pub use scheduler::PolitenessPolicy;
