// src/sitemap.rs
use std::path::PathBuf;

use metrics::{counter, histogram};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use serde::Deserialize;

use crate::error::{IndexerError, Result};

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    url: Vec<UrlEntry>,
}

#[derive(Debug, Deserialize)]
struct UrlEntry {
    loc: Option<String>,
}

/// Where the sitemap comes from.
pub enum SitemapSource {
    File(PathBuf),
    Http { url: String, client: reqwest::Client },
}

impl SitemapSource {
    /// `http://` and `https://` locations are fetched, anything else is a path.
    pub fn from_location(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Http {
                url: location.to_string(),
                client: reqwest::Client::new(),
            }
        } else {
            Self::File(PathBuf::from(location))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(p) => p.display().to_string(),
            Self::Http { url, .. } => url.clone(),
        }
    }

    /// Read and parse the sitemap into URLs in document order.
    pub async fn fetch_urls(&self) -> Result<Vec<String>> {
        let bytes = match self {
            Self::File(path) => tokio::fs::read(path)
                .await
                .map_err(|e| IndexerError::io(path, e))?,
            Self::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| IndexerError::Transport(format!("fetching sitemap {url}: {e}")))?
                    .error_for_status()
                    .map_err(|e| IndexerError::Transport(format!("fetching sitemap {url}: {e}")))?;
                resp.bytes()
                    .await
                    .map_err(|e| IndexerError::Transport(format!("reading sitemap {url}: {e}")))?
                    .to_vec()
            }
        };
        let origin = self.describe();
        let body = String::from_utf8(bytes).map_err(|e| {
            IndexerError::format(&origin, format!("sitemap is not valid UTF-8: {e}"))
        })?;
        parse_sitemap(&body, &origin)
    }
}

/// Parse a `<urlset>` document. Blank `<loc>` values are dropped, duplicates kept.
pub fn parse_sitemap(xml: &str, origin: &str) -> Result<Vec<String>> {
    let t0 = std::time::Instant::now();

    let root = root_element(xml).map_err(|reason| IndexerError::format(origin, reason))?;
    if root != "urlset" {
        return Err(IndexerError::format(
            origin,
            format!("expected <urlset> root, found <{root}>"),
        ));
    }
    let set: UrlSet = from_str(xml).map_err(|e| IndexerError::format(origin, e.to_string()))?;

    let urls: Vec<String> = set
        .url
        .into_iter()
        .filter_map(|u| u.loc)
        .map(|loc| loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect();

    histogram!("indexer_sitemap_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("indexer_sitemap_urls_total").increment(urls.len() as u64);
    Ok(urls)
}

fn root_element(xml: &str) -> std::result::Result<String, String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err("document has no root element".to_string()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_document_order_and_trims() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/b</loc><lastmod>2024-04-05</lastmod></url>
  <url><loc>
      https://example.com/a
  </loc></url>
  <url><loc>https://example.com/c</loc><changefreq>daily</changefreq></url>
</urlset>"#;
        let urls = parse_sitemap(xml, "test").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/b",
                "https://example.com/a",
                "https://example.com/c"
            ]
        );
    }

    #[test]
    fn empty_urlset_yields_nothing() {
        assert!(parse_sitemap("<urlset/>", "test").unwrap().is_empty());
        assert!(parse_sitemap("<urlset></urlset>", "test").unwrap().is_empty());
    }

    #[test]
    fn blank_loc_is_dropped() {
        let xml = "<urlset><url><loc>  </loc></url><url><loc>https://x.test/</loc></url></urlset>";
        assert_eq!(parse_sitemap(xml, "test").unwrap(), vec!["https://x.test/"]);
    }

    #[test]
    fn sitemap_index_is_rejected() {
        let xml = "<sitemapindex><sitemap><loc>https://x.test/s1.xml</loc></sitemap></sitemapindex>";
        let err = parse_sitemap(xml, "sitemap.xml").unwrap_err();
        assert!(matches!(err, IndexerError::Format { .. }));
        assert!(err.to_string().contains("sitemapindex"));
    }

    #[test]
    fn broken_xml_is_format_error() {
        let err = parse_sitemap("<urlset><url><loc>x</url>", "sitemap.xml").unwrap_err();
        assert!(matches!(err, IndexerError::Format { .. }));
        assert!(matches!(
            parse_sitemap("", "sitemap.xml"),
            Err(IndexerError::Format { .. })
        ));
    }

    #[test]
    fn location_picks_source_kind() {
        assert!(matches!(
            SitemapSource::from_location("HTTPS://example.com/sitemap.xml"),
            SitemapSource::Http { .. }
        ));
        assert!(matches!(
            SitemapSource::from_location("public/sitemap.xml"),
            SitemapSource::File(_)
        ));
    }
}
