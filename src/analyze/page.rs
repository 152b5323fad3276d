// src/analyze/page.rs
// =============================================================================
// HTML extraction for a single fetched page.
//
// Pulled out of one document:
// - a[href]                          -> candidate links, resolved absolute
// - link[rel="canonical"]            -> canonical URL
// - link[rel="alternate"][hreflang]  -> locale alternates
// - img                              -> sources missing usable alt text
//
// Relative hrefs are resolved against the page's final URL (post-redirect),
// the same way a browser would.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

/// Metadata extracted from one HTML page.
#[derive(Debug, Clone, Default)]
pub struct PageData {
    /// Absolute http(s) link targets found on the page.
    pub links: Vec<String>,
    /// First canonical URL, resolved absolute.
    pub canonical: Option<String>,
    /// hreflang alternates as declared.
    pub alternates: Vec<HreflangAlt>,
    /// img srcs with missing or empty alt text.
    pub images_missing_alt: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HreflangAlt {
    /// Locale code, lowercased (e.g. "en", "de-at", "x-default").
    pub lang: String,
    pub href: String,
}

/// Parses a page and extracts links, canonical, hreflang alternates and
/// alt-less images in one pass over the DOM.
pub fn extract_page(html: &str, page_url: &Url) -> PageData {
    let document = Html::parse_document(html);

    // Constant selectors, known valid
    let link_sel = Selector::parse("a[href]").unwrap();
    let canonical_sel = Selector::parse(r#"link[rel="canonical"]"#).unwrap();
    let alternate_sel = Selector::parse(r#"link[rel="alternate"][hreflang]"#).unwrap();
    let img_sel = Selector::parse("img").unwrap();

    let mut data = PageData::default();

    for element in document.select(&link_sel) {
        if let Some(href) = element.value().attr("href") {
            if let Some(absolute) = resolve_href(page_url, href) {
                data.links.push(absolute);
            }
        }
    }

    data.canonical = document
        .select(&canonical_sel)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .map(|u| u.to_string());

    for element in document.select(&alternate_sel) {
        let lang = element.value().attr("hreflang").unwrap_or_default().trim();
        let href = element.value().attr("href").unwrap_or_default().trim();
        if lang.is_empty() || href.is_empty() {
            continue;
        }
        if let Ok(resolved) = page_url.join(href) {
            data.alternates.push(HreflangAlt {
                lang: lang.to_ascii_lowercase(),
                href: resolved.to_string(),
            });
        }
    }

    for element in document.select(&img_sel) {
        let Some(src) = element.value().attr("src").map(str::trim) else {
            continue;
        };
        if src.is_empty() {
            continue;
        }
        if image_missing_alt(&element) {
            data.images_missing_alt.push(src.to_string());
        }
    }

    data
}

/// An image needs alt text unless it is explicitly decorative
/// (role="presentation" or role="none").
fn image_missing_alt(element: &scraper::ElementRef<'_>) -> bool {
    if matches!(element.value().attr("role"), Some("presentation") | Some("none")) {
        return false;
    }
    element
        .value()
        .attr("alt")
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .is_none()
}

/// Resolves an href to an absolute http(s) URL, skipping anchors and
/// non-web schemes.
fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }

    // join() handles both relative and absolute hrefs
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
