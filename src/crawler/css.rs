//! Stylesheet scanning and rewriting
//!
//! Works on raw CSS text: `url(...)` references (quoted or not) and
//! `@import "..."` string imports. Used for `.css` files, `<style>` blocks and
//! `style` attributes alike.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static URL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")\s]+)(['"]?)\s*\)"#).expect("hardcoded regex pattern is valid")
});

static IMPORT_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(["'])([^"']+)(["'])"#).expect("hardcoded regex pattern is valid")
});

static HIDDEN_OPACITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)opacity\s*:\s*0+(?:\.0+)?(?P<end>\s*(?:;|!|\}|$))")
        .expect("hardcoded regex pattern is valid")
});

static SCALE_TRANSFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscale\(\s*[0-9.]+\s*\)").expect("hardcoded regex pattern is valid")
});

/// Style block appended to every mirrored page's `<head>`
///
/// Forces elements that script-driven animations would normally reveal to
/// stay visible.
pub const STYLE_OVERRIDES: &str = r#"
[style*="opacity"] { opacity: 1 !important; }
.transform-gpu { transform: scale(1) !important; }
[data-nimg] { opacity: 1 !important; }
"#;

/// Every reference in `css`, in order of first appearance
///
/// `data:` URIs and fragment-only references (SVG filters) are skipped.
pub fn references(css: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    let found = URL_REF
        .captures_iter(css)
        .chain(IMPORT_REF.captures_iter(css))
        .filter_map(|caps| caps.get(2).map(|m| m.as_str()));

    for raw in found {
        if is_inline_or_local(raw) || refs.iter().any(|r| r == raw) {
            continue;
        }
        refs.push(raw.to_string());
    }
    refs
}

/// Replaces references in `css` for which `substitute` returns a value
///
/// Quoting of the original reference is preserved.
pub fn rewrite<F>(css: &str, substitute: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let replace = |caps: &Captures<'_>, prefix: &str, suffix: &str| -> String {
        let open = caps.get(1).map_or("", |m| m.as_str());
        let raw = caps.get(2).map_or("", |m| m.as_str());
        let close = caps.get(3).map_or("", |m| m.as_str());
        match substitute(raw) {
            Some(new) => format!("{}{}{}{}{}", prefix, open, new, close, suffix),
            None => caps.get(0).map_or(String::new(), |m| m.as_str().to_string()),
        }
    };

    let with_urls = URL_REF.replace_all(css, |caps: &Captures<'_>| replace(caps, "url(", ")"));
    IMPORT_REF
        .replace_all(&with_urls, |caps: &Captures<'_>| replace(caps, "@import ", ""))
        .into_owned()
}

/// Undoes inline styles that keep content invisible until script runs
///
/// `opacity:0` becomes `opacity:1` and any `scale(n)` becomes `scale(1)`.
pub fn neutralize_hidden(style: &str) -> String {
    let visible = HIDDEN_OPACITY.replace_all(style, "opacity:1$end");
    SCALE_TRANSFORM.replace_all(&visible, "scale(1)").into_owned()
}

/// MIME type for a font file extension
pub fn font_mime(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "woff2" => Some("font/woff2"),
        "woff" => Some("font/woff"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        "eot" => Some("application/vnd.ms-fontobject"),
        _ => None,
    }
}

/// Font MIME type for a reference, judged by the extension of its path
pub fn font_mime_for_reference(raw: &str) -> Option<&'static str> {
    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    let (_, ext) = path.rsplit_once('.')?;
    font_mime(ext)
}

/// Encodes `bytes` as a base64 `data:` URI
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn is_inline_or_local(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    lower.is_empty() || lower.starts_with("data:") || lower.starts_with('#')
}
