//! Mapping from URLs to files under the output root

use std::path::{Path, PathBuf};
use url::Url;

/// Path of the dynamic image transform endpoint
pub const TRANSFORM_PATH: &str = "/_next/image";

/// A parsed dynamic image transform URL
///
/// `/_next/image?url=/img/hero.png&w=640&q=75` serves a resized rendition
/// of `/img/hero.png`. The mirror fetches the source image directly and
/// stores one file per requested width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTransform {
    /// The `url` parameter as written (usually root-relative)
    pub source: String,
    /// Requested width, if any
    pub width: Option<String>,
    /// Requested quality, if any
    pub quality: Option<String>,
}

impl ImageTransform {
    /// Recognizes a transform URL
    pub fn parse(url: &Url) -> Option<Self> {
        if url.path() != TRANSFORM_PATH {
            return None;
        }

        let mut source = None;
        let mut width = None;
        let mut quality = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "url" => source = Some(value.into_owned()),
                "w" => width = Some(value.into_owned()),
                "q" => quality = Some(value.into_owned()),
                _ => {}
            }
        }

        let source = source.filter(|s| !s.is_empty())?;
        Some(Self {
            source,
            width: width.filter(|w| !w.is_empty()),
            quality,
        })
    }

    /// Resolves the source asset against the transform URL
    pub fn source_url(&self, transform_url: &Url) -> Option<Url> {
        let mut url = transform_url.join(&self.source).ok()?;
        url.set_fragment(None);
        Some(url)
    }
}

/// Returns true if the segment ends in a recognized file extension
///
/// An extension is 1-5 ASCII alphanumerics containing at least one letter,
/// so `report.pdf` qualifies while `v1.2` does not.
pub fn has_recognized_extension(segment: &str) -> bool {
    match segment.rsplit_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

/// Maps a URL to its file under `output_root`
///
/// # Mapping Rules
///
/// | URL path | Local file |
/// |----------|------------|
/// | `/` or empty | `index.html` |
/// | `/docs/` | `docs/index.html` |
/// | `/about` | `about.html` |
/// | `/css/site.css` | `css/site.css` |
/// | `/_next/image?url=/a/b.png&w=640` | `a/b_w640.png` |
///
/// The path is percent-decoded and `.`/`..`/empty segments are dropped, so
/// the result never escapes `output_root`. Queries are ignored except for
/// transform URLs.
///
/// # Examples
///
/// ```
/// use pagemirror::url::local_path;
/// use std::path::Path;
/// use url::Url;
///
/// let url = Url::parse("https://x.test/docs/guide").unwrap();
/// let path = local_path(&url, Path::new("out"));
/// assert_eq!(path, Path::new("out/docs/guide.html"));
/// ```
pub fn local_path(url: &Url, output_root: &Path) -> PathBuf {
    if let Some(transform) = ImageTransform::parse(url) {
        if let Some(source) = transform.source_url(url) {
            let base = path_for(source.path(), output_root);
            return match transform.width {
                Some(width) => with_width_suffix(&base, &width),
                None => base,
            };
        }
    }

    path_for(url.path(), output_root)
}

fn path_for(raw_path: &str, output_root: &Path) -> PathBuf {
    let bytes = urlencoding::decode_binary(raw_path.as_bytes());
    let decoded = String::from_utf8_lossy(&bytes);
    let trailing_slash = decoded.ends_with('/');
    let segments: Vec<&str> = decoded
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    let mut path = output_root.to_path_buf();
    let Some((last, dirs)) = segments.split_last() else {
        path.push("index.html");
        return path;
    };

    for dir in dirs {
        path.push(dir);
    }

    if trailing_slash {
        path.push(last);
        path.push("index.html");
    } else if has_recognized_extension(last) {
        path.push(last);
    } else {
        path.push(format!("{}.html", last));
    }

    path
}

fn with_width_suffix(path: &Path, width: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}_w{}.{}", stem, width, ext.to_string_lossy()),
        None => format!("{}_w{}", stem, width),
    };
    path.with_file_name(file_name)
}
