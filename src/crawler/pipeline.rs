//! Concurrent asset fetch-and-persist pipeline
//!
//! Every same-origin asset is downloaded at most once per run. The registry
//! hands out one slot per canonical URL; the first task to initialize a slot
//! downloads the asset while later tasks wait on it. Downloads are bounded by
//! a semaphore sized by the configured worker count.
//!
//! Stylesheets are expanded after their slot is filled: referenced assets go
//! through the same dedup path, fonts are inlined as `data:` URIs and all
//! other references are rewritten relative to the stylesheet.

use crate::assets::AssetCategory;
use crate::crawler::context::CrawlContext;
use crate::crawler::css;
use crate::crawler::FetchOutcome;
use crate::state::{ConditionalHeaders, ResponseValidators, StoredAsset};
use crate::storage::write_atomic;
use crate::url::{relative_reference, CanonicalUrl};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Stylesheets nested deeper than this are stored but not expanded
pub const MAX_CSS_DEPTH: usize = 8;

/// A stored asset and the reference that reaches it from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
    pub key: CanonicalUrl,
    pub reference: String,
}

/// Stylesheet work left for the task that downloaded it
enum CssWork {
    /// Fresh body, not yet recorded in the incremental store
    Fresh {
        text: String,
        validators: ResponseValidators,
    },
    /// 304 reuse; the assets it referenced last time
    Unchanged(Vec<String>),
}

/// Handle to the asset pipeline; clones share one worker pool
#[derive(Clone)]
pub struct AssetPipeline {
    ctx: Arc<CrawlContext>,
    permits: Arc<Semaphore>,
}

impl AssetPipeline {
    /// Creates a pipeline allowing `workers` concurrent downloads
    pub fn new(ctx: Arc<CrawlContext>, workers: usize) -> Self {
        Self {
            ctx,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Canonical key for a same-origin reference
    ///
    /// Returns `None` for unfetchable, malformed and cross-origin references,
    /// which are left untouched in the referencing document.
    pub fn resolve(&self, raw: &str, base: &Url) -> Option<CanonicalUrl> {
        match self.ctx.resolver.normalize(raw, base) {
            Ok(key) if self.ctx.resolver.is_same_origin(key.as_url()) => Some(key),
            Ok(key) => {
                tracing::trace!("Leaving cross-origin reference {}", key);
                None
            }
            Err(e) => {
                tracing::trace!("Leaving reference {:?}: {}", raw, e);
                None
            }
        }
    }

    /// Localizes one reference found in a document
    ///
    /// # Arguments
    ///
    /// * `raw` - The reference as written
    /// * `referer` - URL of the referencing document
    /// * `referer_file` - Local file of the referencing document
    ///
    /// # Returns
    ///
    /// The reference to substitute, or `None` to keep the original. Failures
    /// are logged and never propagated.
    pub async fn fetch_asset(
        &self,
        raw: &str,
        referer: &Url,
        referer_file: &Path,
    ) -> Option<LocalReference> {
        let key = self.resolve(raw, referer)?;
        let asset = self.ensure(key.clone(), 0).await?;
        Some(LocalReference {
            reference: relative_reference(referer_file, &asset.path),
            key,
        })
    }

    /// Makes sure the asset behind `key` is on disk
    ///
    /// Concurrent calls for the same key share one download. Failures are
    /// remembered for the rest of the run.
    pub fn ensure(&self, key: CanonicalUrl, depth: usize) -> BoxFuture<'static, Option<StoredAsset>> {
        let this = self.clone();
        async move {
            let slot = this.ctx.registry.slot(&key);
            if let Some(done) = slot.get() {
                tracing::trace!("Asset already resolved: {}", key);
                return done.clone();
            }

            let mut css_work: Option<CssWork> = None;
            let outcome = {
                let work = &mut css_work;
                let (pipeline, key) = (&this, &key);
                slot.get_or_init(|| async move {
                    let (asset, pending) = pipeline.download(key).await;
                    *work = pending;
                    asset
                })
                .await
                .clone()
            };

            // Only the task that filled the slot carries stylesheet work
            if let (Some(asset), Some(work)) = (&outcome, css_work) {
                this.expand(&key, asset, work, depth).await;
            }
            outcome
        }
        .boxed()
    }

    /// Ensures every asset in `keys` (stored canonical URLs)
    pub async fn ensure_all(&self, keys: &[String], depth: usize) -> usize {
        let tasks = keys.iter().filter_map(|raw| match Url::parse(raw) {
            Ok(url) => Some(self.ensure(CanonicalUrl::asset(&url), depth)),
            Err(e) => {
                tracing::debug!("Ignoring stored asset key {:?}: {}", raw, e);
                None
            }
        });
        join_all(tasks).await.into_iter().flatten().count()
    }

    /// Stops handing out download permits
    pub fn close(&self) {
        self.permits.close();
    }

    /// Downloads and persists one asset
    async fn download(&self, key: &CanonicalUrl) -> (Option<StoredAsset>, Option<CssWork>) {
        let Ok(_permit) = self.permits.acquire().await else {
            tracing::debug!("Pipeline closed; not fetching {}", key);
            return (None, None);
        };

        let ctx = &self.ctx;
        let target = ctx.resolver.fetch_target(key.as_url());
        let path = ctx.resolver.local_path(key.as_url());

        let mut result = ctx.client.get(&target, &ctx.store.conditional_headers(key)).await;
        if let Ok(FetchOutcome::NotModified) = result {
            if let Some(entry) = ctx.store.resolve_not_modified(key) {
                let category = AssetCategory::classify(&target, entry.content_type.as_deref());
                tracing::debug!("Asset unchanged: {}", key);
                ctx.stats.asset_unchanged();
                let work = (category == AssetCategory::Css).then(|| CssWork::Unchanged(entry.assets));
                let asset = StoredAsset {
                    path: entry.local_path,
                    category,
                };
                return (Some(asset), work);
            }
            tracing::debug!("304 for {} but its file is gone; refetching", key);
            result = ctx.client.get(&target, &ConditionalHeaders::default()).await;
        }

        let response = match result {
            Ok(FetchOutcome::Fetched(response)) => response,
            Ok(FetchOutcome::NotModified) => {
                tracing::warn!("Unexpected 304 for unconditional request to {}", target);
                ctx.stats.asset_failed();
                return (None, None);
            }
            Err(e) => {
                tracing::warn!("Failed to fetch asset {}: {}", key, e);
                ctx.stats.asset_failed();
                return (None, None);
            }
        };

        let validators = response.validators().clone();
        let content_type = response.content_type().to_string();
        let category = AssetCategory::classify(&target, Some(&content_type));
        if !ctx.filter.admits(key.as_str(), category) {
            tracing::debug!("Filtered {} asset {}", category, key);
            ctx.stats.asset_filtered();
            return (None, None);
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Failed to read asset {}: {}", key, e);
                ctx.stats.asset_failed();
                return (None, None);
            }
        };

        if !ctx.filter.admits_size(body.len() as u64) {
            tracing::debug!("Filtered {} ({} bytes)", key, body.len());
            ctx.stats.asset_filtered();
            return (None, None);
        }

        if category.is_observed() {
            ctx.observer.observe(key.as_str(), &body, &content_type);
        }

        if let Err(e) = write_atomic(&path, &body).await {
            tracing::warn!("Failed to write {}: {}", path.display(), e);
            ctx.stats.asset_failed();
            return (None, None);
        }
        ctx.stats.bytes_written(body.len());
        ctx.stats.asset_downloaded();
        tracing::debug!("Saved asset {} -> {}", key, path.display());

        let work = if category == AssetCategory::Css {
            Some(CssWork::Fresh {
                text: String::from_utf8_lossy(&body).into_owned(),
                validators,
            })
        } else {
            ctx.store.record_success(key, &validators, &path, Vec::new(), Vec::new());
            None
        };

        let asset = StoredAsset {
            path,
            category,
        };
        (Some(asset), work)
    }

    /// Resolves the references of a stored stylesheet
    async fn expand(&self, key: &CanonicalUrl, sheet: &StoredAsset, work: CssWork, depth: usize) {
        let (text, validators) = match work {
            CssWork::Unchanged(assets) => {
                if depth < MAX_CSS_DEPTH {
                    self.ensure_all(&assets, depth + 1).await;
                }
                return;
            }
            CssWork::Fresh { text, validators } => (text, validators),
        };

        if depth >= MAX_CSS_DEPTH {
            tracing::warn!("Stylesheet nesting too deep; not expanding {}", key);
            self.ctx
                .store
                .record_success(key, &validators, &sheet.path, Vec::new(), Vec::new());
            return;
        }

        let refs = css::references(&text);
        let resolved = join_all(refs.into_iter().map(|raw| {
            let child = self.resolve(&raw, key.as_url());
            async move {
                let child = child?;
                let asset = self.ensure(child.clone(), depth + 1).await?;
                Some((raw, child, asset))
            }
        }))
        .await;

        let mut substitutions = Vec::new();
        let mut referenced = Vec::new();
        for (raw, child, asset) in resolved.into_iter().flatten() {
            let replacement = match inline_font(&raw, &asset).await {
                Some(uri) => uri,
                None => relative_reference(&sheet.path, &asset.path),
            };
            substitutions.push((raw, replacement));
            referenced.push(child.to_string());
        }

        let rewritten = css::rewrite(&text, |raw| {
            substitutions
                .iter()
                .find(|(r, _)| r == raw)
                .map(|(_, replacement)| replacement.clone())
        });

        if rewritten != text {
            if let Err(e) = write_atomic(&sheet.path, rewritten.as_bytes()).await {
                tracing::warn!("Failed to rewrite stylesheet {}: {}", sheet.path.display(), e);
                return;
            }
            self.ctx.stats.bytes_written(rewritten.len());
        }

        self.ctx
            .store
            .record_success(key, &validators, &sheet.path, Vec::new(), referenced);
    }
}

/// Reads a stored font back as a `data:` URI
///
/// Fonts without a known extension are typed by category alone. Returns
/// `None` for non-fonts and on read failure; the caller then falls back to a
/// relative reference.
async fn inline_font(raw: &str, asset: &StoredAsset) -> Option<String> {
    let mime = asset
        .path
        .extension()
        .and_then(|ext| css::font_mime(&ext.to_string_lossy()))
        .or_else(|| css::font_mime_for_reference(raw))
        .or_else(|| (asset.category == AssetCategory::Font).then_some("application/octet-stream"))?;

    match tokio::fs::read(&asset.path).await {
        Ok(bytes) => Some(css::data_uri(mime, &bytes)),
        Err(e) => {
            tracing::warn!(
                "Failed to inline font {}: {}; using a relative path",
                asset.path.display(),
                e
            );
            None
        }
    }
}
