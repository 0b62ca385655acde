//! URL handling module
//!
//! This module resolves references found in pages and stylesheets, produces
//! the canonical identity keys used for dedup, confines the crawl to the seed
//! origin, and maps every URL onto a file under the output root.

mod local_path;
mod normalize;
mod origin;
mod relative;

pub use local_path::{has_recognized_extension, local_path, ImageTransform, TRANSFORM_PATH};
pub use normalize::{is_unfetchable, resolve_reference, strip_query};
pub use origin::Origin;
pub use relative::relative_reference;

use crate::{UrlError, UrlResult};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Identity key for pages and assets
///
/// Pages drop their fragment and query (unless they are transform URLs);
/// assets drop only the fragment. Two spellings of the same resource always
/// produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Canonical key for a page
    pub fn page(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        if ImageTransform::parse(&url).is_none() {
            strip_query(&mut url);
        }
        Self(url)
    }

    /// Canonical key for an asset
    pub fn asset(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolves references relative to the mirrored site
#[derive(Debug, Clone)]
pub struct UrlResolver {
    seed: Url,
    origin: Origin,
    output_root: PathBuf,
}

impl UrlResolver {
    /// Creates a resolver for the site rooted at `seed`
    ///
    /// # Arguments
    ///
    /// * `seed` - The seed URL of the crawl
    /// * `output_root` - Directory mirrored files are written under
    ///
    /// # Returns
    ///
    /// * `Ok(UrlResolver)` - The seed is an absolute http(s) URL with a host
    /// * `Err(UrlError)` - The seed cannot anchor a crawl
    pub fn new(seed: &str, output_root: impl Into<PathBuf>) -> UrlResult<Self> {
        let mut seed = Url::parse(seed).map_err(|e| UrlError::Parse(e.to_string()))?;
        if seed.scheme() != "http" && seed.scheme() != "https" {
            return Err(UrlError::InvalidScheme(seed.scheme().to_string()));
        }
        let origin = Origin::of(&seed).ok_or(UrlError::MissingHost)?;
        seed.set_fragment(None);

        Ok(Self {
            seed,
            origin,
            output_root: output_root.into(),
        })
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Resolves `raw` against `base` into an asset key
    ///
    /// Unfetchable or malformed references yield an error; the caller leaves
    /// the original text in place.
    pub fn normalize(&self, raw: &str, base: &Url) -> UrlResult<CanonicalUrl> {
        resolve_reference(raw, base).map(|url| CanonicalUrl::asset(&url))
    }

    /// Resolves `raw` against `base` into a page key
    pub fn normalize_page(&self, raw: &str, base: &Url) -> UrlResult<CanonicalUrl> {
        resolve_reference(raw, base).map(|url| CanonicalUrl::page(&url))
    }

    /// Returns true if `url` belongs to the mirrored origin
    pub fn is_same_origin(&self, url: &Url) -> bool {
        self.origin.contains(url)
    }

    /// Local file for `url` under the output root
    pub fn local_path(&self, url: &Url) -> PathBuf {
        local_path(url, &self.output_root)
    }

    /// The URL actually requested for `url`
    ///
    /// Transform URLs are fetched from their source image; everything else is
    /// fetched as is.
    pub fn fetch_target(&self, url: &Url) -> Url {
        ImageTransform::parse(url)
            .and_then(|t| t.source_url(url))
            .unwrap_or_else(|| url.clone())
    }

    /// Location of robots.txt for the mirrored origin
    pub fn robots_url(&self) -> Url {
        let mut url = self.seed.clone();
        url.set_path("/robots.txt");
        url.set_query(None);
        url
    }
}
