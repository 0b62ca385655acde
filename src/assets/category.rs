use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Kind of resource a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    Html,
    Css,
    Js,
    Image,
    Font,
    Media,
    Doc,
    Other,
}

impl AssetCategory {
    /// All categories, in declaration order
    pub const ALL: [AssetCategory; 8] = [
        AssetCategory::Html,
        AssetCategory::Css,
        AssetCategory::Js,
        AssetCategory::Image,
        AssetCategory::Font,
        AssetCategory::Media,
        AssetCategory::Doc,
        AssetCategory::Other,
    ];

    /// Classifies a file extension (without the dot, any case)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let category = match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => AssetCategory::Html,
            "css" => AssetCategory::Css,
            "js" | "mjs" | "ts" => AssetCategory::Js,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "bmp" | "tiff"
            | "avif" => AssetCategory::Image,
            "woff2" | "woff" | "ttf" | "eot" | "otf" => AssetCategory::Font,
            "mp4" | "webm" | "mp3" | "wav" | "ogg" | "mov" => AssetCategory::Media,
            "pdf" | "txt" | "xml" | "json" => AssetCategory::Doc,
            _ => return None,
        };
        Some(category)
    }

    /// Classifies a Content-Type header value
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime == "text/css" {
            AssetCategory::Css
        } else if mime.contains("javascript") || mime.contains("ecmascript") {
            AssetCategory::Js
        } else if mime.starts_with("image/") {
            AssetCategory::Image
        } else if mime.starts_with("font/") || mime.contains("font-woff") {
            AssetCategory::Font
        } else if mime.starts_with("audio/") || mime.starts_with("video/") {
            AssetCategory::Media
        } else if mime == "text/html" || mime == "application/xhtml+xml" {
            AssetCategory::Html
        } else {
            AssetCategory::Other
        }
    }

    /// Classifies by URL extension first, then by content type
    pub fn classify(url: &Url, content_type: Option<&str>) -> Self {
        Self::from_url(url)
            .or_else(|| content_type.map(Self::from_content_type))
            .unwrap_or(AssetCategory::Other)
    }

    /// Classifies by the extension of the URL's last path segment
    pub fn from_url(url: &Url) -> Option<Self> {
        let segment = url.path_segments()?.next_back()?;
        let (_, ext) = segment.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Returns true if body notifications should reach the recon observer
    pub fn is_observed(&self) -> bool {
        matches!(
            self,
            AssetCategory::Js | AssetCategory::Css | AssetCategory::Doc | AssetCategory::Other
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Html => "html",
            AssetCategory::Css => "css",
            AssetCategory::Js => "js",
            AssetCategory::Image => "image",
            AssetCategory::Font => "font",
            AssetCategory::Media => "media",
            AssetCategory::Doc => "doc",
            AssetCategory::Other => "other",
        }
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        AssetCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown asset type '{}'", s))
    }
}

impl<'de> Deserialize<'de> for AssetCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
