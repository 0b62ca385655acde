//! Per-page processing
//!
//! Drives one page through its states: fetch (conditional when possible),
//! parse, resolve every referenced asset through the pipeline, rewrite and
//! persist. Failures stop the page and are logged with its URL; they never
//! reach the crawl loop.

use crate::crawler::context::CrawlContext;
use crate::crawler::parser::{analyze_page, PageAnalysis, RefKind};
use crate::crawler::pipeline::AssetPipeline;
use crate::crawler::rewrite::{rewrite_page, RewritePlan};
use crate::crawler::{FetchError, FetchOutcome, FetchedResponse};
use crate::state::{ConditionalHeaders, PageState};
use crate::storage::write_atomic;
use crate::url::{relative_reference, resolve_reference, CanonicalUrl, ImageTransform};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// What the crawl loop needs back from a processed page
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// Terminal state the page reached
    pub state: PageState,

    /// Same-origin page links discovered on the page
    pub links: Vec<CanonicalUrl>,
}

impl PageOutcome {
    fn finished(state: PageState) -> Self {
        Self {
            state,
            links: Vec::new(),
        }
    }
}

/// Tracks the state of one page and logs every transition
struct Transitions<'a> {
    url: &'a CanonicalUrl,
    state: PageState,
}

impl<'a> Transitions<'a> {
    fn start(url: &'a CanonicalUrl) -> Self {
        tracing::trace!("{}: {}", url, PageState::Fetching);
        Self {
            url,
            state: PageState::Fetching,
        }
    }

    fn advance(&mut self, next: PageState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid page transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("{}: {} -> {}", self.url, self.state, next);
        self.state = next;
    }

    fn fail(mut self) -> PageOutcome {
        self.advance(PageState::Errored);
        PageOutcome::finished(self.state)
    }
}

/// Processes pages one at a time, fanning their assets out to the pipeline
#[derive(Clone)]
pub struct PageProcessor {
    ctx: Arc<CrawlContext>,
    pipeline: AssetPipeline,
}

impl PageProcessor {
    pub fn new(ctx: Arc<CrawlContext>, pipeline: AssetPipeline) -> Self {
        Self { ctx, pipeline }
    }

    /// Runs `key` through fetch, parse, asset resolution, rewrite and persist
    ///
    /// # Returns
    ///
    /// The terminal state plus the discovered same-origin links. A page
    /// answered with 304 returns the links recorded when it was last saved.
    pub async fn process(&self, key: &CanonicalUrl) -> PageOutcome {
        let mut transitions = Transitions::start(key);
        let page_file = self.ctx.resolver.local_path(key.as_url());

        let response = match self.fetch(key).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                transitions.advance(PageState::NotModified);
                return self.reuse_unchanged(key).await;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch page {}: {}", key, e);
                return transitions.fail();
            }
        };
        if !response.is_html() {
            tracing::debug!(
                "Skipping {}: not HTML ({})",
                key,
                response.content_type()
            );
            transitions.advance(PageState::NotHtml);
            return PageOutcome::finished(transitions.state);
        }
        transitions.advance(PageState::Fetched);

        let validators = response.validators().clone();
        let content_type = response.content_type().to_string();
        let base = response.final_url().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read page {}: {}", key, e);
                return transitions.fail();
            }
        };
        self.ctx.observer.observe(key.as_str(), &body, &content_type);

        transitions.advance(PageState::Parsing);
        let html = String::from_utf8_lossy(&body).into_owned();
        let analysis = analyze_page(&html);
        if let Some(title) = &analysis.title {
            tracing::debug!("Parsed {} ({})", key, title);
        }

        transitions.advance(PageState::AssetResolution);
        let (assets, asset_keys) = self.resolve_assets(&analysis, &base, &page_file).await;
        let (anchors, links) = self.resolve_anchors(&analysis, &base, &page_file);

        transitions.advance(PageState::Rewriting);
        let plan = RewritePlan {
            removed_scripts: &analysis.removed_scripts,
            assets: &assets,
            anchors: &anchors,
        };
        let rewritten = match rewrite_page(&html, &plan) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!("Failed to rewrite {}: {}", key, e);
                return transitions.fail();
            }
        };

        if let Err(e) = write_atomic(&page_file, rewritten.as_bytes()).await {
            tracing::warn!("Failed to write {}: {}", page_file.display(), e);
            return transitions.fail();
        }
        self.ctx.stats.bytes_written(rewritten.len());
        self.ctx.store.record_success(
            key,
            &validators,
            &page_file,
            links.iter().map(|l| l.to_string()).collect(),
            asset_keys,
        );
        transitions.advance(PageState::Persisted);
        tracing::info!(
            "Saved {} -> {} ({} assets, {} links)",
            key,
            page_file.display(),
            assets.len(),
            links.len()
        );

        PageOutcome {
            state: transitions.state,
            links,
        }
    }

    /// Conditional GET for a page
    ///
    /// Returns `Ok(None)` for a 304 whose prior file still exists. A 304 with
    /// the file gone triggers one unconditional refetch.
    async fn fetch(&self, key: &CanonicalUrl) -> Result<Option<FetchedResponse>, FetchError> {
        let client = &self.ctx.client;
        let conditional = self.ctx.store.conditional_headers(key);

        match client.get(key.as_url(), &conditional).await? {
            FetchOutcome::Fetched(response) => return Ok(Some(response)),
            FetchOutcome::NotModified => {
                if self.ctx.store.resolve_not_modified(key).is_some() {
                    return Ok(None);
                }
                tracing::debug!("304 for {} but its file is gone; refetching", key);
            }
        }

        match client.get(key.as_url(), &ConditionalHeaders::default()).await? {
            FetchOutcome::Fetched(response) => Ok(Some(response)),
            FetchOutcome::NotModified => Err(FetchError::Status {
                url: key.to_string(),
                status: 304,
            }),
        }
    }

    /// Re-registers an unchanged page's assets and returns its stored links
    async fn reuse_unchanged(&self, key: &CanonicalUrl) -> PageOutcome {
        let Some(entry) = self.ctx.store.resolve_not_modified(key) else {
            return PageOutcome::finished(PageState::NotModified);
        };
        tracing::info!("Unchanged: {}", key);

        self.pipeline.ensure_all(&entry.assets, 0).await;

        let links = entry
            .links
            .iter()
            .filter_map(|raw| Url::parse(raw).ok())
            .map(|url| CanonicalUrl::page(&url))
            .collect();
        PageOutcome {
            state: PageState::NotModified,
            links,
        }
    }

    /// Dispatches every asset reference concurrently and waits for all of them
    ///
    /// Returns the substitution map (raw reference to local reference) and the
    /// canonical keys of the assets that reached disk.
    async fn resolve_assets(
        &self,
        analysis: &PageAnalysis,
        base: &Url,
        page_file: &Path,
    ) -> (HashMap<String, String>, Vec<String>) {
        let handles: Vec<_> = analysis
            .asset_refs
            .iter()
            .filter(|r| !(r.kind == RefKind::Preload && is_transform(&r.raw, base)))
            .map(|r| {
                let pipeline = self.pipeline.clone();
                let raw = r.raw.clone();
                let base = base.clone();
                let page_file = page_file.to_path_buf();
                tokio::spawn(async move {
                    let local = pipeline.fetch_asset(&raw, &base, &page_file).await;
                    (raw, local)
                })
            })
            .collect();

        let mut substitutions = HashMap::new();
        let mut keys = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok((raw, Some(local))) => {
                    let key = local.key.to_string();
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                    substitutions.insert(raw, local.reference);
                }
                Ok((raw, None)) => {
                    tracing::trace!("Keeping original reference {}", raw);
                }
                Err(e) => {
                    tracing::warn!("Asset task failed: {}", e);
                }
            }
        }
        (substitutions, keys)
    }

    /// Maps same-origin anchors to local files and collects them as links
    fn resolve_anchors(
        &self,
        analysis: &PageAnalysis,
        base: &Url,
        page_file: &Path,
    ) -> (HashMap<String, String>, Vec<CanonicalUrl>) {
        let resolver = &self.ctx.resolver;
        let mut anchors = HashMap::new();
        let mut links = Vec::new();
        let mut seen = HashSet::new();

        for raw in &analysis.anchors {
            let Ok(target) = resolver.normalize_page(raw, base) else {
                continue;
            };
            if !resolver.is_same_origin(target.as_url()) {
                continue;
            }

            let target_file: PathBuf = resolver.local_path(target.as_url());
            let mut local = relative_reference(page_file, &target_file);
            if let Some((_, fragment)) = raw.split_once('#') {
                local.push('#');
                local.push_str(fragment);
            }
            anchors.insert(raw.clone(), local);

            if seen.insert(target.clone()) {
                links.push(target);
            }
        }
        (anchors, links)
    }
}

fn is_transform(raw: &str, base: &Url) -> bool {
    resolve_reference(raw, base)
        .map(|url| ImageTransform::parse(&url).is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetFilter;
    use crate::config::{CrawlerConfig, UserAgentConfig};
    use crate::crawler::FetchClient;
    use crate::output::StatsRecorder;
    use crate::recon::NoopObserver;
    use crate::state::{AssetRegistry, IncrementalStore};
    use crate::url::UrlResolver;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn processor(server: &MockServer, out: &Path) -> PageProcessor {
        let ctx = Arc::new(CrawlContext {
            client: Arc::new(
                FetchClient::new(&CrawlerConfig::default(), &UserAgentConfig::default()).unwrap(),
            ),
            resolver: UrlResolver::new(&format!("{}/", server.uri()), out).unwrap(),
            registry: AssetRegistry::new(),
            store: IncrementalStore::in_memory(true),
            filter: AssetFilter::allow_all(),
            observer: Arc::new(NoopObserver),
            stats: StatsRecorder::new(),
        });
        let pipeline = AssetPipeline::new(Arc::clone(&ctx), 2);
        PageProcessor::new(ctx, pipeline)
    }

    fn key(server: &MockServer, p: &str) -> CanonicalUrl {
        CanonicalUrl::page(&Url::parse(&format!("{}{}", server.uri(), p)).unwrap())
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/html; charset=utf-8")
    }

    #[tokio::test]
    async fn test_page_saved_with_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(
                r#"<html><head><link rel="stylesheet" href="/s.css"></head><body>
                <a href="/about#team">About</a>
                <a href="https://other.test/b.html">Elsewhere</a>
                <img src="/logo.png">
                </body></html>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/s.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("body{color:red}")
                    .insert_header("content-type", "text/css"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![1u8; 8])
                    .insert_header("content-type", "image/png"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let processor = processor(&server, dir.path());
        let outcome = processor.process(&key(&server, "/")).await;

        assert_eq!(outcome.state, PageState::Persisted);
        assert_eq!(outcome.links, vec![key(&server, "/about")]);

        let saved = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(saved.contains(r#"href="s.css""#));
        assert!(saved.contains(r#"src="logo.png""#));
        assert!(saved.contains(r#"href="about.html#team""#));
        assert!(saved.contains(r#"href="https://other.test/b.html""#));
        assert!(dir.path().join("s.css").is_file());
    }

    #[tokio::test]
    async fn test_non_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let outcome = processor(&server, dir.path())
            .process(&key(&server, "/data.json"))
            .await;
        assert_eq!(outcome.state, PageState::NotHtml);
        assert!(outcome.links.is_empty());
    }

    #[tokio::test]
    async fn test_http_error_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let outcome = processor(&server, dir.path())
            .process(&key(&server, "/broken"))
            .await;
        assert_eq!(outcome.state, PageState::Errored);
        assert!(!dir.path().join("broken.html").exists());
    }

    #[tokio::test]
    async fn test_framework_scripts_removed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(
                r#"<html><head>
                <script src="/_next/static/app.js"></script>
                <script>window.__NUXT__={}</script>
                <script>console.log("plain")</script>
                </head><body><div style="opacity:0">Hi</div></body></html>"#,
            ))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        processor(&server, dir.path()).process(&key(&server, "/")).await;

        let saved = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
        assert!(!saved.contains("app.js"));
        assert!(!saved.contains("__NUXT__"));
        assert!(saved.contains(r#"console.log("plain")"#));
        assert!(saved.contains(r#"style="opacity:1""#));
    }
}
