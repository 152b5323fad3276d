// src/analyze/sitemap.rs
// =============================================================================
// Sitemap fetching and <loc> extraction.
//
// Handles both flavors:
// - <urlset> with <url><loc> entries (page URLs)
// - <sitemapindex> with <sitemap><loc> entries (child sitemaps, followed
//   one level deep, bounded)
//
// The XML is lenient-parsed with scraper's HTML parser; sitemap documents
// only need the <loc> elements picked out, which CSS selectors do fine.
// A missing or unreachable sitemap is a warning, not an error: the crawl
// falls back to the base URL as its only seed and the orphan pass is
// skipped.
// =============================================================================

use log::{debug, warn};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

// Upper bound on child sitemaps followed from a sitemap index
const MAX_CHILD_SITEMAPS: usize = 50;

/// Fetches the site's sitemap and returns every same-host page URL in it.
/// An empty Vec means no usable sitemap was found.
pub async fn fetch_sitemap(client: &Client, base: &Url, sitemap_path: &str) -> Vec<Url> {
    let root = match base.join(sitemap_path) {
        Ok(root) => root,
        Err(e) => {
            warn!("invalid sitemap path '{}': {}", sitemap_path, e);
            return Vec::new();
        }
    };

    let Some(xml) = fetch_xml(client, &root).await else {
        return Vec::new();
    };
    let parsed = parse_sitemap(&xml);

    let mut seen: HashSet<String> = HashSet::new();
    let mut urls: Vec<Url> = Vec::new();
    let mut keep = |candidates: Vec<Url>| {
        for candidate in candidates {
            if candidate.host_str() != base.host_str() {
                debug!("ignoring off-host sitemap entry {}", candidate);
                continue;
            }
            if seen.insert(candidate.to_string()) {
                urls.push(candidate);
            }
        }
    };

    keep(parsed.pages);

    if parsed.children.len() > MAX_CHILD_SITEMAPS {
        warn!(
            "sitemap index lists {} child sitemaps, following the first {}",
            parsed.children.len(),
            MAX_CHILD_SITEMAPS
        );
    }
    for child in parsed.children.into_iter().take(MAX_CHILD_SITEMAPS) {
        if child.host_str() != base.host_str() {
            debug!("ignoring off-host child sitemap {}", child);
            continue;
        }
        if let Some(xml) = fetch_xml(client, &child).await {
            keep(parse_sitemap(&xml).pages);
        }
    }

    urls
}

async fn fetch_xml(client: &Client, url: &Url) -> Option<String> {
    match client.get(url.clone()).send().await {
        Ok(response) if response.status().is_success() => match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("failed to read sitemap {}: {}", url, e);
                None
            }
        },
        Ok(response) => {
            warn!("sitemap {} returned HTTP {}", url, response.status());
            None
        }
        Err(e) => {
            warn!("failed to fetch sitemap {}: {}", url, e);
            None
        }
    }
}

struct SitemapDoc {
    /// <url><loc> page entries.
    pages: Vec<Url>,
    /// <sitemap><loc> child sitemap entries.
    children: Vec<Url>,
}

fn parse_sitemap(xml: &str) -> SitemapDoc {
    let document = Html::parse_document(xml);
    let page_sel = Selector::parse("url > loc").unwrap();
    let child_sel = Selector::parse("sitemap > loc").unwrap();
    SitemapDoc {
        pages: select_locs(&document, &page_sel),
        children: select_locs(&document, &child_sel),
    }
}

fn select_locs(document: &Html, selector: &Selector) -> Vec<Url> {
    document
        .select(selector)
        .filter_map(|element| {
            let text: String = element.text().collect();
            Url::parse(text.trim()).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
              <url><loc>https://example.com/pricing</loc></url>
            </urlset>"#;
        let doc = parse_sitemap(xml);
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[1].as_str(), "https://example.com/pricing");
        assert!(doc.children.is_empty());
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
              <sitemap><loc>https://example.com/sitemap-blog.xml</loc></sitemap>
            </sitemapindex>"#;
        let doc = parse_sitemap(xml);
        assert!(doc.pages.is_empty());
        assert_eq!(doc.children.len(), 2);
        assert_eq!(
            doc.children[0].as_str(),
            "https://example.com/sitemap-pages.xml"
        );
    }

    #[test]
    fn test_parse_skips_unparseable_locs() {
        let xml = r#"
            <urlset>
              <url><loc>not a url</loc></url>
              <url><loc>https://example.com/ok</loc></url>
            </urlset>"#;
        let doc = parse_sitemap(xml);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].as_str(), "https://example.com/ok");
    }

    #[test]
    fn test_parse_whitespace_around_loc() {
        let xml = "<urlset><url><loc>\n  https://example.com/contact \n</loc></url></urlset>";
        let doc = parse_sitemap(xml);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].as_str(), "https://example.com/contact");
    }
}
