// src/crawl/frontier.rs
// =============================================================================
// Breadth-first crawl of a site's internal link graph.
//
// How it works:
// 1. Seeds (the base URL, plus sitemap URLs in audit mode) form depth 1
// 2. Each depth wave is drained through a bounded pool of concurrent
//    fetches (buffer_unordered)
// 3. Internal links extracted from fetched pages form the next wave, after
//    dedup against the visited set and the exclude patterns
// 4. Repeat until the frontier is empty or max depth is reached
//
// Every internal and external link reference is recorded along the way;
// the classification passes in report::issues work from those maps.
// =============================================================================

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::analyze::{self, PageData};
use crate::config::AuditConfig;
use crate::crawl::fetch::{FetchFailure, FetchOutcome, Fetcher, RedirectHop};

/// One fetched (or attempted) page.
#[derive(Debug)]
pub struct PageRecord {
    /// Normalized URL the crawl requested.
    pub url: Url,
    /// BFS depth; seeds are depth 1.
    pub depth: usize,
    /// Redirect chain observed on the way to the terminal response.
    pub hops: Vec<RedirectHop>,
    pub result: PageResult,
}

#[derive(Debug)]
pub enum PageResult {
    /// 2xx HTML page with its extracted metadata.
    Html { final_url: Url, data: PageData },
    /// 2xx non-HTML resource.
    Other {
        final_url: Url,
        content_type: Option<String>,
    },
    /// Redirect chain left the site.
    OffSite { target: Url },
    Failed(FetchFailure),
}

/// Everything a crawl produces: page records plus the link-reference maps
/// used by the classification passes.
#[derive(Debug, Default)]
pub struct CrawlOutput {
    pub pages: Vec<PageRecord>,
    /// Normalized internal URL -> pages that link to it.
    pub internal_refs: HashMap<String, Vec<String>>,
    /// External URL -> pages that link to it.
    pub external_refs: HashMap<String, Vec<String>>,
}

/// Normalizes a URL for dedup and comparison: fragments dropped, trailing
/// slash stripped on non-root paths. (The url crate already drops default
/// ports at parse time.)
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    normalized
}

enum LinkTarget {
    Internal(Url),
    External(Url),
}

/// Splits an absolute link into internal (same host, normalized) or
/// external. Links without a host (data:, etc.) were already filtered out
/// during extraction.
fn classify_target(link: &str, host: &str) -> Option<LinkTarget> {
    let parsed = Url::parse(link).ok()?;
    match parsed.host_str() {
        Some(h) if h == host => Some(LinkTarget::Internal(normalize_url(&parsed))),
        Some(_) => Some(LinkTarget::External(parsed)),
        None => None,
    }
}

/// Crawls the site breadth-first from the given seeds.
pub async fn crawl(base: &Url, seeds: Vec<Url>, config: &AuditConfig) -> Result<CrawlOutput> {
    let host = base
        .host_str()
        .with_context(|| format!("base URL has no host: {}", base))?
        .to_string();
    let fetcher = Fetcher::new(config, &host)?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: Vec<(Url, usize)> = Vec::new();
    for seed in seeds {
        let seed = normalize_url(&seed);
        if config.is_excluded(&seed) {
            debug!("seed {} matches an exclude pattern, skipping", seed);
            continue;
        }
        if visited.insert(seed.to_string()) {
            frontier.push((seed, 1));
        }
    }

    let mut output = CrawlOutput::default();

    while !frontier.is_empty() {
        let wave: Vec<(Url, usize)> = std::mem::take(&mut frontier);
        let depth = wave[0].1;
        info!("crawling {} page(s) at depth {}", wave.len(), depth);

        let records: Vec<PageRecord> = stream::iter(
            wave.into_iter()
                .map(|(url, depth)| crawl_one(&fetcher, url, depth)),
        )
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

        for record in records {
            if let PageResult::Html { data, .. } = &record.result {
                let referrer = record.url.to_string();
                for link in &data.links {
                    match classify_target(link, &host) {
                        Some(LinkTarget::Internal(target)) => {
                            let key = target.to_string();
                            output
                                .internal_refs
                                .entry(key.clone())
                                .or_default()
                                .push(referrer.clone());
                            if record.depth < config.max_depth
                                && !config.is_excluded(&target)
                                && visited.insert(key)
                            {
                                frontier.push((target, record.depth + 1));
                            }
                        }
                        Some(LinkTarget::External(target)) => {
                            output
                                .external_refs
                                .entry(target.to_string())
                                .or_default()
                                .push(referrer.clone());
                        }
                        None => {}
                    }
                }
            }
            output.pages.push(record);
        }
    }

    // A base URL that redirects off-site means we audited the wrong host
    let base_key = normalize_url(base).to_string();
    if let Some(record) = output.pages.iter().find(|p| p.url.as_str() == base_key) {
        if let PageResult::OffSite { target } = &record.result {
            bail!("base URL {} redirects off-site to {}", base, target);
        }
    }

    Ok(output)
}

async fn crawl_one(fetcher: &Fetcher, url: Url, depth: usize) -> PageRecord {
    debug!("fetching [depth {}] {}", depth, url);
    match fetcher.fetch_page(&url).await {
        FetchOutcome::Html {
            final_url,
            hops,
            body,
        } => {
            let data = analyze::extract_page(&body, &final_url);
            PageRecord {
                url,
                depth,
                hops,
                result: PageResult::Html { final_url, data },
            }
        }
        FetchOutcome::Resource {
            final_url,
            hops,
            content_type,
        } => {
            debug!(
                "{} is not HTML ({}), skipping parse",
                final_url,
                content_type.as_deref().unwrap_or("no content type")
            );
            PageRecord {
                url,
                depth,
                hops,
                result: PageResult::Other {
                    final_url,
                    content_type,
                },
            }
        }
        FetchOutcome::OffSite { target, hops } => PageRecord {
            url,
            depth,
            hops,
            result: PageResult::OffSite { target },
        },
        FetchOutcome::Failed { failure, hops } => {
            warn!("failed to fetch {}: {}", url, failure);
            PageRecord {
                url,
                depth,
                hops,
                result: PageResult::Failed(failure),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_normalize_drops_fragment() {
        let normalized = normalize_url(&url("https://example.com/pricing#faq"));
        assert_eq!(normalized.as_str(), "https://example.com/pricing");
    }

    #[test]
    fn test_normalize_strips_trailing_slash_on_paths() {
        let normalized = normalize_url(&url("https://example.com/services/"));
        assert_eq!(normalized.as_str(), "https://example.com/services");
    }

    #[test]
    fn test_normalize_keeps_root_slash() {
        let normalized = normalize_url(&url("https://example.com/"));
        assert_eq!(normalized.as_str(), "https://example.com/");
    }

    #[test]
    fn test_normalize_keeps_query() {
        let normalized = normalize_url(&url("https://example.com/search?q=rust"));
        assert_eq!(normalized.as_str(), "https://example.com/search?q=rust");
    }

    #[test]
    fn test_classify_internal_link_is_normalized() {
        let target = classify_target("https://example.com/about/#team", "example.com");
        match target {
            Some(LinkTarget::Internal(u)) => {
                assert_eq!(u.as_str(), "https://example.com/about");
            }
            _ => panic!("expected internal target"),
        }
    }

    #[test]
    fn test_classify_external_link() {
        let target = classify_target("https://other.com/page", "example.com");
        assert!(matches!(target, Some(LinkTarget::External(_))));
    }

    #[test]
    fn test_classify_subdomain_is_external() {
        let target = classify_target("https://blog.example.com/post", "example.com");
        assert!(matches!(target, Some(LinkTarget::External(_))));
    }
}
