//! HTML index of the mirrored pages
//!
//! Written to the output root after each run so the mirror can be browsed
//! from one entry point even when the site's own navigation is scripted.

use crate::output::CrawlReport;
use crate::storage::write_atomic_sync;
use crate::url::relative_reference;
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the index under the output root
pub const SITEMAP_FILE_NAME: &str = "sitemap.html";

/// Writes the index for `report`
///
/// # Returns
///
/// * `Ok(Some(path))` - The index was written
/// * `Ok(None)` - The site has its own page at the index location; nothing was written
/// * `Err(io::Error)` - The file could not be written
pub fn write_sitemap(report: &CrawlReport) -> io::Result<Option<PathBuf>> {
    let target = report.output_root.join(SITEMAP_FILE_NAME);
    if report.pages.values().any(|page| page == &target) {
        tracing::debug!("Site serves its own {}; not writing an index", SITEMAP_FILE_NAME);
        return Ok(None);
    }

    let html = render_sitemap(report, &target);
    write_atomic_sync(&target, html.as_bytes())?;
    tracing::info!("Wrote index of {} pages to {}", report.pages.len(), target.display());
    Ok(Some(target))
}

fn render_sitemap(report: &CrawlReport, target: &Path) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Mirrored pages</title>\n</head>\n<body>\n<h1>Mirrored pages</h1>\n<ul>\n",
    );

    for (url, file) in &report.pages {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape_html(&relative_reference(target, file)),
            escape_html(url)
        ));
    }

    html.push_str(&format!(
        "</ul>\n<p>Mirrored from {} on {}</p>\n</body>\n</html>\n",
        escape_html(&report.seed),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(root: &Path, pages: &[(&str, &str)]) -> CrawlReport {
        CrawlReport {
            seed: "https://x.test/".to_string(),
            output_root: root.to_path_buf(),
            pages: pages
                .iter()
                .map(|(url, file)| (url.to_string(), root.join(file)))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_links_are_relative_to_root() {
        let dir = TempDir::new().unwrap();
        let report = report(
            dir.path(),
            &[
                ("https://x.test/", "index.html"),
                ("https://x.test/blog/a b", "blog/a b.html"),
            ],
        );

        let path = write_sitemap(&report).unwrap().unwrap();
        let html = std::fs::read_to_string(path).unwrap();

        assert!(html.contains(r#"<a href="index.html">https://x.test/</a>"#));
        assert!(html.contains(r#"<a href="blog/a%20b.html">"#));
    }

    #[test]
    fn test_escapes_markup() {
        let dir = TempDir::new().unwrap();
        let report = report(dir.path(), &[("https://x.test/?q=<b>&x", "index.html")]);

        let html = render_sitemap(&report, &dir.path().join(SITEMAP_FILE_NAME));
        assert!(html.contains("https://x.test/?q=&lt;b&gt;&amp;x"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_site_page_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SITEMAP_FILE_NAME), "theirs").unwrap();
        let report = report(dir.path(), &[("https://x.test/sitemap.html", SITEMAP_FILE_NAME)]);

        assert!(write_sitemap(&report).unwrap().is_none());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(SITEMAP_FILE_NAME)).unwrap(),
            "theirs"
        );
    }
}
