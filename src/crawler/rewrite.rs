//! Streaming HTML rewrite of a mirrored page
//!
//! Passes run in a fixed order: script and preload removal, asset
//! substitution, style neutralization, anchor rewriting, then injection of the
//! style override block. The document is serialized once.

use crate::crawler::css;
use crate::crawler::parser::first_srcset_candidate;
use lol_html::errors::RewritingError;
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use std::collections::{BTreeSet, HashMap};

/// Substitutions decided before the rewrite starts
#[derive(Debug, Clone, Copy)]
pub struct RewritePlan<'a> {
    /// Ordinals of `<script>` elements to drop
    pub removed_scripts: &'a BTreeSet<usize>,

    /// Raw asset reference to its local replacement
    pub assets: &'a HashMap<String, String>,

    /// Raw anchor `href` to its local replacement
    pub anchors: &'a HashMap<String, String>,
}

impl<'a> RewritePlan<'a> {
    fn asset(&self, raw: &str) -> Option<&'a str> {
        lookup(self.assets, raw)
    }

    fn anchor(&self, raw: &str) -> Option<&'a str> {
        lookup(self.anchors, raw)
    }

    /// Rewrites the references of a CSS fragment found in the page
    fn rewrite_css(&self, text: &str) -> String {
        css::rewrite(text, |raw| self.asset(raw).map(str::to_string))
    }
}

/// Applies `plan` to `html` and returns the rewritten document
pub fn rewrite_page(html: &str, plan: &RewritePlan<'_>) -> Result<String, RewritingError> {
    let mut script_ordinal = 0usize;
    let mut style_text = String::new();

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script", |el| {
                    if plan.removed_scripts.contains(&script_ordinal) {
                        el.remove();
                    }
                    script_ordinal += 1;
                    Ok(())
                }),
                element!("link[href]", |el| {
                    let rel = el.get_attribute("rel").unwrap_or_default().to_ascii_lowercase();
                    let has = |token: &str| rel.split_ascii_whitespace().any(|t| t == token);

                    if has("preload") && !has("stylesheet") {
                        el.remove();
                        return Ok(());
                    }
                    if has("stylesheet") {
                        el.remove_attribute("crossorigin");
                        el.remove_attribute("integrity");
                    }
                    if has("stylesheet") || rel.contains("icon") {
                        if let Some(local) = el.get_attribute("href").and_then(|h| plan.asset(&h)) {
                            el.set_attribute("href", local)?;
                        }
                    }
                    Ok(())
                }),
                element!("img[src]", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|s| plan.asset(&s)) {
                        el.set_attribute("src", local)?;
                        el.remove_attribute("srcset");
                    }
                    Ok(())
                }),
                element!("source", |el| {
                    if let Some(local) = el.get_attribute("src").and_then(|s| plan.asset(&s)) {
                        el.set_attribute("src", local)?;
                    }
                    let localized = el.get_attribute("srcset").and_then(|srcset| {
                        first_srcset_candidate(&srcset).and_then(|first| plan.asset(first))
                    });
                    if let Some(local) = localized {
                        el.set_attribute("srcset", local)?;
                    }
                    Ok(())
                }),
                element!("[style]", |el| {
                    if let Some(style) = el.get_attribute("style") {
                        let decoded = decode_attribute(&style);
                        let rewritten = css::neutralize_hidden(&plan.rewrite_css(&decoded));
                        if rewritten != decoded {
                            el.set_attribute("style", &rewritten)?;
                        }
                    }
                    Ok(())
                }),
                text!("style", |chunk| {
                    style_text.push_str(chunk.as_str());
                    if chunk.last_in_text_node() {
                        let rewritten = plan.rewrite_css(&style_text);
                        chunk.replace(&rewritten, ContentType::Html);
                        style_text.clear();
                    } else {
                        chunk.remove();
                    }
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(local) = el.get_attribute("href").and_then(|h| plan.anchor(&h)) {
                        el.set_attribute("href", local)?;
                    }
                    Ok(())
                }),
                element!("head", |el| {
                    el.append(
                        &format!("<style>{}</style>", css::STYLE_OVERRIDES),
                        ContentType::Html,
                    );
                    Ok(())
                }),
            ],
            // Ambiguous markup is rewritten best-effort instead of failing
            strict: false,
            ..RewriteStrSettings::default()
        },
    )
}

/// Looks up a raw attribute value, tolerating entity-encoded ampersands
fn lookup<'a>(map: &'a HashMap<String, String>, raw: &str) -> Option<&'a str> {
    map.get(raw)
        .or_else(|| {
            let decoded = decode_attribute(raw);
            (decoded != raw).then(|| map.get(&decoded)).flatten()
        })
        .or_else(|| {
            let trimmed = raw.trim();
            (trimmed != raw).then(|| map.get(trimmed)).flatten()
        })
        .map(String::as_str)
}

/// Decodes the character references that commonly appear in URL attributes
fn decode_attribute(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
