use crate::UrlError;
use url::Url;

/// Reference prefixes that never point at a fetchable resource
const UNFETCHABLE_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Returns true if a raw reference can never resolve to a fetchable resource
///
/// Fragment-only references, script pseudo-URLs, mail/phone links and inline
/// `data:` URIs are all left untouched by the mirror.
pub fn is_unfetchable(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    UNFETCHABLE_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Resolves a raw reference against the URL of the document it appeared in
///
/// # Resolution Steps
///
/// 1. Trim surrounding whitespace and reject unfetchable references
/// 2. Join against `base` (handles relative and protocol-relative forms;
///    a protocol-relative reference inherits the base scheme)
/// 3. Reject anything that is not http or https
/// 4. Remove the fragment
///
/// # Arguments
///
/// * `raw` - The reference as written in the document
/// * `base` - URL of the referencing document
///
/// # Returns
///
/// * `Ok(Url)` - Absolute URL without fragment
/// * `Err(UrlError)` - The reference is unfetchable or malformed
///
/// # Examples
///
/// ```
/// use pagemirror::url::resolve_reference;
/// use url::Url;
///
/// let base = Url::parse("https://x.test/docs/intro.html").unwrap();
/// let url = resolve_reference("../img/a.png#top", &base).unwrap();
/// assert_eq!(url.as_str(), "https://x.test/img/a.png");
/// ```
pub fn resolve_reference(raw: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    if is_unfetchable(trimmed) {
        return Err(UrlError::NotFetchable(raw.to_string()));
    }

    let mut url = base
        .join(trimmed)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);
    Ok(url)
}

/// Removes the query string from a URL
pub fn strip_query(url: &mut Url) {
    url.set_query(None);
}
