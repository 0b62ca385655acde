//! HTML parser for finding asset references, links and scripts
//!
//! This module reads a fetched page and extracts:
//! - Every asset-bearing reference the rewriter may later substitute
//! - Anchor targets to follow
//! - Which `<script>` elements the rewriter must drop
//! - The page title
//!
//! Parsing is best-effort: malformed markup yields whatever structure the
//! HTML5 parser recovers.

use crate::crawler::css;
use crate::url::is_unfetchable;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Inline script markers of client-side frameworks
const FRAMEWORK_MARKERS: &[&str] = &["_next", "react", "__nuxt", "webpackjsonp"];

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("link[href]"));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img[src]"));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("source"));
static STYLE_ATTR: LazyLock<Selector> = LazyLock::new(|| selector("[style]"));
static STYLE_BLOCK: LazyLock<Selector> = LazyLock::new(|| selector("style"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("hardcoded selector is valid")
}

/// Where an asset reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Stylesheet,
    Icon,
    Preload,
    Image,
    Source,
    InlineStyle,
    StyleBlock,
}

/// One asset reference exactly as written in the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub raw: String,
    pub kind: RefKind,
}

/// Everything the page processor needs from a parsed page
#[derive(Debug, Clone, Default)]
pub struct PageAnalysis {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Asset references in document order, without duplicates
    pub asset_refs: Vec<AssetRef>,

    /// Raw `href` of every followable anchor
    pub anchors: Vec<String>,

    /// Ordinals (over all `<script>` elements) of scripts to remove
    pub removed_scripts: BTreeSet<usize>,
}

/// Parses a page and collects what the rewrite needs
///
/// # Asset references
///
/// - `<link rel="stylesheet">`, `<link rel="icon">` (any rel containing
///   `icon`) and `<link rel="preload">` hrefs
/// - `<img src>`
/// - `<source src>` and the first candidate of `<source srcset>`
/// - `url(...)` and `@import` references in `style` attributes and `<style>`
///   blocks
///
/// # Example
///
/// ```
/// use pagemirror::crawler::analyze_page;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let analysis = analyze_page(html);
/// assert_eq!(analysis.title, Some("Test".to_string()));
/// assert_eq!(analysis.anchors, vec!["/page".to_string()]);
/// ```
pub fn analyze_page(html: &str) -> PageAnalysis {
    let document = Html::parse_document(html);
    let mut analysis = PageAnalysis {
        title: extract_title(&document),
        removed_scripts: removed_scripts(&document),
        ..PageAnalysis::default()
    };

    for link in document.select(&LINK) {
        let Some(kind) = link_kind(&link) else {
            continue;
        };
        if let Some(href) = link.value().attr("href") {
            analysis.push_asset(href, kind);
        }
    }

    for img in document.select(&IMG) {
        if let Some(src) = img.value().attr("src") {
            analysis.push_asset(src, RefKind::Image);
        }
    }

    for source in document.select(&SOURCE) {
        if let Some(src) = source.value().attr("src") {
            analysis.push_asset(src, RefKind::Source);
        }
        if let Some(first) = source.value().attr("srcset").and_then(first_srcset_candidate) {
            analysis.push_asset(first, RefKind::Source);
        }
    }

    for block in document.select(&STYLE_BLOCK) {
        let text: String = block.text().collect();
        for raw in css::references(&text) {
            analysis.push_asset(&raw, RefKind::StyleBlock);
        }
    }

    for element in document.select(&STYLE_ATTR) {
        if let Some(style) = element.value().attr("style") {
            for raw in css::references(style) {
                analysis.push_asset(&raw, RefKind::InlineStyle);
            }
        }
    }

    for anchor in document.select(&ANCHOR) {
        if let Some(href) = anchor.value().attr("href") {
            if !is_unfetchable(href) && !analysis.anchors.iter().any(|a| a == href) {
                analysis.anchors.push(href.to_string());
            }
        }
    }

    analysis
}

impl PageAnalysis {
    fn push_asset(&mut self, raw: &str, kind: RefKind) {
        if is_unfetchable(raw) {
            return;
        }
        if let Some(existing) = self.asset_refs.iter_mut().find(|r| r.raw == raw) {
            // A preload never hides a real use of the same reference
            if existing.kind == RefKind::Preload {
                existing.kind = kind;
            }
            return;
        }
        self.asset_refs.push(AssetRef {
            raw: raw.to_string(),
            kind,
        });
    }
}

/// First URL of a `srcset` value
pub fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .and_then(|candidate| candidate.split_whitespace().next())
        .filter(|url| !url.is_empty())
}

/// Returns true if a `<script>` must not survive mirroring
///
/// External scripts always go; inline scripts go when they mention a known
/// client-side framework.
pub fn is_removable_script(has_src: bool, text: &str) -> bool {
    if has_src {
        return true;
    }
    let lower = text.to_ascii_lowercase();
    FRAMEWORK_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn removed_scripts(document: &Html) -> BTreeSet<usize> {
    document
        .select(&SCRIPT)
        .enumerate()
        .filter(|(_, script)| {
            let has_src = script.value().attr("src").is_some();
            let text: String = script.text().collect();
            is_removable_script(has_src, &text)
        })
        .map(|(ordinal, _)| ordinal)
        .collect()
}

fn link_kind(link: &ElementRef<'_>) -> Option<RefKind> {
    let rel = link.value().attr("rel")?.to_ascii_lowercase();
    let has = |token: &str| rel.split_ascii_whitespace().any(|t| t == token);
    if has("stylesheet") {
        Some(RefKind::Stylesheet)
    } else if has("preload") {
        Some(RefKind::Preload)
    } else if rel.contains("icon") {
        Some(RefKind::Icon)
    } else {
        None
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    document
        .select(&TITLE)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(analysis: &PageAnalysis, kind: RefKind) -> Vec<&str> {
        analysis
            .asset_refs
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.raw.as_str())
            .collect()
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>Test Page</title></head><body></body></html>"#;
        assert_eq!(analyze_page(html).title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        assert_eq!(analyze_page(html).title, Some("Test Page".to_string()));
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        assert_eq!(analyze_page(html).title, None);
    }

    #[test]
    fn test_anchors_kept_raw() {
        let html = r#"<html><body>
            <a href="/other">Link</a>
            <a href="other.html#part">Rel</a>
            <a href="https://other.test/page">Ext</a>
            <a href="/other">Dup</a>
        </body></html>"#;
        assert_eq!(
            analyze_page(html).anchors,
            vec!["/other", "other.html#part", "https://other.test/page"]
        );
    }

    #[test]
    fn test_skip_unfollowable_anchors() {
        let html = r##"<html><body>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:test@example.com">mail</a>
            <a href="tel:+1234567890">tel</a>
            <a href="data:text/html,hi">data</a>
            <a href="#section">jump</a>
            <a href="">empty</a>
        </body></html>"##;
        assert!(analyze_page(html).anchors.is_empty());
    }

    #[test]
    fn test_follow_nofollow_links() {
        let html = r#"<html><body><a href="/page" rel="nofollow">Link</a></body></html>"#;
        assert_eq!(analyze_page(html).anchors, vec!["/page"]);
    }

    #[test]
    fn test_link_kinds() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="/s.css">
            <link rel="icon" href="/favicon.ico">
            <link rel="apple-touch-icon" href="/touch.png">
            <link rel="preload" href="/f.woff2" as="font">
            <link rel="canonical" href="https://x.test/">
        </head></html>"#;
        let analysis = analyze_page(html);
        assert_eq!(raws(&analysis, RefKind::Stylesheet), vec!["/s.css"]);
        assert_eq!(
            raws(&analysis, RefKind::Icon),
            vec!["/favicon.ico", "/touch.png"]
        );
        assert_eq!(raws(&analysis, RefKind::Preload), vec!["/f.woff2"]);
        assert_eq!(analysis.asset_refs.len(), 4);
    }

    #[test]
    fn test_images_and_sources() {
        let html = r#"<html><body>
            <img src="/a.png" srcset="/a-2x.png 2x">
            <picture>
                <source srcset="/b.webp 1x, /b-2x.webp 2x">
                <source src="/c.mp4">
            </picture>
            <img src="data:image/png;base64,AAAA">
        </body></html>"#;
        let analysis = analyze_page(html);
        assert_eq!(raws(&analysis, RefKind::Image), vec!["/a.png"]);
        assert_eq!(raws(&analysis, RefKind::Source), vec!["/b.webp", "/c.mp4"]);
    }

    #[test]
    fn test_css_references() {
        let html = r#"<html><head>
            <style>@import "/theme.css"; body { background: url(/bg.png) }</style>
        </head><body>
            <div style="background-image: url('/hero.jpg')"></div>
            <div style="background: url(/bg.png)"></div>
        </body></html>"#;
        let analysis = analyze_page(html);
        assert_eq!(raws(&analysis, RefKind::InlineStyle), vec!["/hero.jpg"]);
        assert_eq!(
            raws(&analysis, RefKind::StyleBlock),
            vec!["/bg.png", "/theme.css"]
        );
    }

    #[test]
    fn test_preload_upgraded_by_real_use() {
        let html = r#"<html><head>
            <link rel="preload" href="/hero.png" as="image">
        </head><body><img src="/hero.png"></body></html>"#;
        let analysis = analyze_page(html);
        assert_eq!(analysis.asset_refs.len(), 1);
        assert_eq!(analysis.asset_refs[0].kind, RefKind::Image);
    }

    #[test]
    fn test_removed_scripts() {
        let html = r#"<html><head>
            <script src="/app.js"></script>
            <script>console.log("hello")</script>
            <script>self.__next_f = self.__next_f || []</script>
            <script>window.__NUXT__ = {}</script>
        </head><body>
            <script type="application/ld+json">{"@type":"Organization"}</script>
            <script>(self.webpackJsonp = self.webpackJsonp || [])</script>
        </body></html>"#;
        let removed: Vec<usize> = analyze_page(html).removed_scripts.into_iter().collect();
        assert_eq!(removed, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_first_srcset_candidate() {
        assert_eq!(first_srcset_candidate("/a.png 1x, /b.png 2x"), Some("/a.png"));
        assert_eq!(first_srcset_candidate("  /a.png"), Some("/a.png"));
        assert_eq!(first_srcset_candidate(""), None);
    }

    #[test]
    fn test_malformed_html_is_best_effort() {
        let html = r#"<html><body><div><img src="/a.png"><a href="/x">unclosed"#;
        let analysis = analyze_page(html);
        assert_eq!(raws(&analysis, RefKind::Image), vec!["/a.png"]);
        assert_eq!(analysis.anchors, vec!["/x"]);
    }
}
