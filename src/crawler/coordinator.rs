//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the traversal loop that coordinates a mirror run:
//! - Building the shared context from configuration
//! - Draining the breadth-first frontier one page at a time
//! - Robots checks and politeness pauses between pages
//! - Fetching supplementary assets once the frontier is empty
//! - Flushing incremental state and assembling the run report

use crate::assets::AssetFilter;
use crate::config::{validate, Config};
use crate::crawler::context::CrawlContext;
use crate::crawler::page::PageProcessor;
use crate::crawler::pipeline::AssetPipeline;
use crate::crawler::scheduler::PolitenessPolicy;
use crate::crawler::FetchClient;
use crate::output::{CrawlReport, StatsRecorder};
use crate::recon::ReconObserver;
use crate::robots::RobotsPolicy;
use crate::state::{AssetRegistry, Frontier, IncrementalStore};
use crate::storage::JsonStateFile;
use crate::url::{CanonicalUrl, UrlResolver};
use crate::MirrorError;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Drives one mirror run over a site
pub struct CrawlEngine {
    config: Config,
    ctx: Arc<CrawlContext>,
    pipeline: AssetPipeline,
    processor: PageProcessor,
    robots: RobotsPolicy,
    politeness: PolitenessPolicy,
}

impl CrawlEngine {
    /// Creates an engine for `config`
    ///
    /// # Arguments
    ///
    /// * `config` - The mirror configuration
    /// * `observer` - Receives fetched bodies; pass `NoopObserver` when unused
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Ready to run
    /// * `Err(MirrorError)` - Invalid configuration, unusable seed URL,
    ///   output directory that cannot be created, or HTTP client failure
    pub fn new(config: Config, observer: Arc<dyn ReconObserver>) -> crate::Result<Self> {
        validate(&config)?;

        let output_root = &config.site.output_dir;
        std::fs::create_dir_all(output_root).map_err(|source| MirrorError::OutputDir {
            path: output_root.display().to_string(),
            source,
        })?;

        let resolver = UrlResolver::new(&config.site.seed_url, output_root)?;
        let filter = AssetFilter::from_config(&config.filter)?;
        let client = Arc::new(FetchClient::new(&config.crawler, &config.user_agent)?);
        let store = IncrementalStore::load(
            Box::new(JsonStateFile::in_dir(&config.state_dir())),
            config.crawler.incremental,
        );
        let robots = RobotsPolicy::new(
            Arc::clone(&client),
            resolver.robots_url(),
            config.crawler.respect_robots,
        );

        let ctx = Arc::new(CrawlContext {
            client,
            resolver,
            registry: AssetRegistry::new(),
            store,
            filter,
            observer,
            stats: StatsRecorder::new(),
        });
        let pipeline = AssetPipeline::new(Arc::clone(&ctx), config.crawler.workers);
        let processor = PageProcessor::new(Arc::clone(&ctx), pipeline.clone());
        let politeness = PolitenessPolicy::new(&config.crawler);

        Ok(Self {
            config,
            ctx,
            pipeline,
            processor,
            robots,
            politeness,
        })
    }

    /// Runs the crawl until the frontier drains or `cancel` fires
    ///
    /// Per-page and per-asset failures are logged and counted in the report;
    /// they never end the run early.
    pub async fn run(&self, cancel: CancellationToken) -> crate::Result<CrawlReport> {
        let start_time = Instant::now();
        let seed = self.ctx.resolver.seed().clone();
        let output_root = self.ctx.resolver.output_root().to_path_buf();

        tracing::info!("Mirroring {} into {}", seed, output_root.display());
        if self.ctx.store.is_enabled() {
            tracing::info!("Incremental mode: {} known resources", self.ctx.store.len());
        }

        let disallowed_paths = self.robots.disallowed_paths().await;
        if !disallowed_paths.is_empty() {
            tracing::info!(
                "robots.txt disallows {} paths: {}",
                disallowed_paths.len(),
                disallowed_paths.join(", ")
            );
        }

        let frontier = Frontier::with_seed(CanonicalUrl::page(&seed));
        let mut skipped = Vec::new();
        let mut interrupted = false;

        while let Some(page) = next_page(&frontier, &cancel) {
            if !self.robots.can_fetch(page.as_url()).await {
                tracing::info!("Skipping {} (disallowed by robots.txt)", page);
                self.ctx.stats.page_skipped();
                skipped.push(page.to_string());
                continue;
            }

            let request_number = self.ctx.client.note_page_request();
            tracing::debug!("Page request #{}: {}", request_number, page);

            let outcome = self.processor.process(&page).await;
            self.ctx.stats.record_page(outcome.state);

            let discovered = outcome.links.len();
            let queued = outcome
                .links
                .into_iter()
                .filter(|link| frontier.push(link.clone()))
                .count();
            tracing::debug!(
                "{}: {} links, {} new, {} pending",
                page,
                discovered,
                queued,
                frontier.pending()
            );

            if frontier.is_empty() {
                continue;
            }
            let delay = self.politeness.next_delay(self.robots.crawl_delay().await);
            if !self.politeness.pause(delay, &cancel).await {
                interrupted = true;
            }
        }

        if cancel.is_cancelled() {
            interrupted = true;
        }

        if interrupted {
            tracing::warn!(
                "Interrupted with {} pages still queued; saving progress",
                frontier.pending()
            );
        } else {
            self.fetch_supplementary_assets().await;
        }

        if let Err(e) = self.ctx.store.flush() {
            tracing::warn!("Failed to save incremental state: {}", e);
        }
        self.pipeline.close();
        self.ctx.observer.emit_report(&output_root);

        let skipped_set: HashSet<&str> = skipped.iter().map(String::as_str).collect();
        let visited: Vec<String> = frontier
            .visited()
            .into_iter()
            .filter(|url| !skipped_set.contains(url.as_str()))
            .collect();
        let pages = visited
            .iter()
            .filter_map(|raw| {
                let file = self.ctx.resolver.local_path(&Url::parse(raw).ok()?);
                file.is_file().then(|| (raw.clone(), file))
            })
            .collect();

        let report = CrawlReport {
            seed: seed.to_string(),
            output_root,
            visited,
            pages,
            skipped,
            assets: self.ctx.registry.snapshot(),
            disallowed_paths,
            interrupted,
            stats: self
                .ctx
                .stats
                .snapshot(self.ctx.client.page_requests(), start_time.elapsed()),
        };

        tracing::info!(
            "Crawl completed: {} pages, {} assets in {:?}",
            report.pages_visited(),
            report.assets_stored(),
            report.stats.elapsed
        );

        Ok(report)
    }

    /// Fetches the configured assets that no page links to
    async fn fetch_supplementary_assets(&self) {
        let extras = &self.config.site.supplementary_assets;
        if extras.is_empty() {
            return;
        }

        let seed = self.ctx.resolver.seed();
        let tasks = extras.iter().filter_map(|raw| {
            let key = self.pipeline.resolve(raw, seed);
            if key.is_none() {
                tracing::warn!("Ignoring supplementary asset {:?}", raw);
            }
            key.map(|key| self.pipeline.ensure(key, 0))
        });

        let stored = join_all(tasks).await.into_iter().flatten().count();
        tracing::info!(
            "Supplementary assets: {} of {} stored",
            stored,
            extras.len()
        );
    }
}

/// Next page to visit, or `None` once the frontier drains or the user interrupts
fn next_page(frontier: &Frontier, cancel: &CancellationToken) -> Option<CanonicalUrl> {
    if cancel.is_cancelled() {
        return None;
    }
    frontier.pop()
}
