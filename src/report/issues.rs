// src/report/issues.rs
// =============================================================================
// Issue model and post-crawl classification.
//
// The crawl collects raw material (page records, link-reference maps); the
// passes here turn it into findings:
//
// - BrokenLink        fetch failed, or a verified link target failed
// - RedirectChain     page reached through one or more redirect hops
// - MissingCanonical / CanonicalMismatch
// - MissingHreflang   configured locale (or x-default) has no alternate
// - OrphanPage        in the sitemap, but nothing on the site links to it
// - ImageMissingAlt
//
// Every pass is a pure function over the crawl output so it can be tested
// without touching the network.
// =============================================================================

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use url::Url;

use crate::config::AuditConfig;
use crate::crawl::{
    normalize_url, CheckedLink, CrawlOutput, FetchFailure, PageResult, RedirectHop,
};

/// Which classification passes run. The `links` subcommand skips the SEO
/// passes (canonical, hreflang, orphans, image alt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    Full,
    LinksOnly,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    BrokenLink {
        url: String,
        reason: String,
        found_on: Vec<String>,
    },
    RedirectChain {
        url: String,
        hops: Vec<RedirectHop>,
        /// None when the chain never resolved (hop limit or cycle).
        #[serde(skip_serializing_if = "Option::is_none")]
        final_url: Option<String>,
    },
    MissingCanonical {
        page: String,
    },
    CanonicalMismatch {
        page: String,
        canonical: String,
    },
    MissingHreflang {
        page: String,
        missing: Vec<String>,
    },
    OrphanPage {
        url: String,
    },
    ImageMissingAlt {
        page: String,
        src: String,
    },
}

impl Issue {
    /// The URL the issue is anchored to, for sorting and display.
    pub fn url(&self) -> &str {
        match self {
            Issue::BrokenLink { url, .. }
            | Issue::RedirectChain { url, .. }
            | Issue::OrphanPage { url } => url,
            Issue::MissingCanonical { page }
            | Issue::CanonicalMismatch { page, .. }
            | Issue::MissingHreflang { page, .. }
            | Issue::ImageMissingAlt { page, .. } => page,
        }
    }
}

/// The finished report, ready for rendering.
#[derive(Debug, Serialize)]
pub struct Report {
    pub base_url: String,
    pub pages_crawled: usize,
    pub links_checked: usize,
    pub issues: Vec<Issue>,
}

/// Link targets the crawl discovered but never fetched: external links,
/// internal links beyond the depth limit, and hreflang alternates. These
/// get a single existence check each. Excluded paths are left alone.
pub fn pending_link_targets(
    base: &Url,
    crawl: &CrawlOutput,
    config: &AuditConfig,
) -> Vec<(String, Vec<String>)> {
    let crawled: HashSet<&str> = crawl.pages.iter().map(|p| p.url.as_str()).collect();
    let mut targets: BTreeMap<String, Vec<String>> = BTreeMap::new();

    if config.check_external {
        for (url, refs) in &crawl.external_refs {
            targets.entry(url.clone()).or_default().extend(refs.iter().cloned());
        }
    }

    for (url, refs) in &crawl.internal_refs {
        if crawled.contains(url.as_str()) {
            continue;
        }
        if let Ok(parsed) = Url::parse(url) {
            if config.is_excluded(&parsed) {
                continue;
            }
        }
        targets.entry(url.clone()).or_default().extend(refs.iter().cloned());
    }

    // hreflang alternates are references too; verify the ones the crawl
    // never fetched
    for record in &crawl.pages {
        let PageResult::Html { data, .. } = &record.result else {
            continue;
        };
        for alternate in &data.alternates {
            let Ok(parsed) = Url::parse(&alternate.href) else {
                continue;
            };
            let internal = parsed.host_str() == base.host_str();
            if !internal && !config.check_external {
                continue;
            }
            if internal && config.is_excluded(&parsed) {
                continue;
            }
            let key = if internal {
                normalize_url(&parsed).to_string()
            } else {
                parsed.to_string()
            };
            if crawled.contains(key.as_str()) {
                continue;
            }
            targets.entry(key).or_default().push(record.url.to_string());
        }
    }

    targets
        .into_iter()
        .map(|(url, refs)| {
            let refs = dedup_sorted(&refs);
            (url, refs)
        })
        .collect()
}

/// Runs the classification passes and assembles the report.
pub fn classify(
    base: &Url,
    crawl: &CrawlOutput,
    sitemap_urls: &[Url],
    checked: &[CheckedLink],
    config: &AuditConfig,
    mode: AuditMode,
) -> Report {
    let mut issues = Vec::new();

    broken_link_pass(crawl, checked, &mut issues);
    redirect_chain_pass(crawl, &mut issues);

    if mode == AuditMode::Full {
        canonical_pass(crawl, &mut issues);
        hreflang_pass(crawl, config, &mut issues);
        orphan_pass(base, crawl, sitemap_urls, &mut issues);
        image_alt_pass(crawl, &mut issues);
    }

    let links_checked = crawl.internal_refs.len()
        + if config.check_external {
            crawl.external_refs.len()
        } else {
            0
        };

    Report {
        base_url: base.to_string(),
        pages_crawled: crawl.pages.len(),
        links_checked,
        issues,
    }
}

fn broken_link_pass(crawl: &CrawlOutput, checked: &[CheckedLink], issues: &mut Vec<Issue>) {
    let mut found = Vec::new();

    for record in &crawl.pages {
        if let PageResult::Failed(failure) = &record.result {
            // Hop-limit failures are reported by the redirect-chain pass
            if matches!(failure, FetchFailure::TooManyRedirects) {
                continue;
            }
            found.push(Issue::BrokenLink {
                url: record.url.to_string(),
                reason: failure.to_string(),
                found_on: referrers(crawl, record.url.as_str()),
            });
        }
    }

    for link in checked {
        if let Some(failure) = &link.failure {
            found.push(Issue::BrokenLink {
                url: link.url.clone(),
                reason: failure.to_string(),
                found_on: dedup_sorted(&link.referrers),
            });
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn redirect_chain_pass(crawl: &CrawlOutput, issues: &mut Vec<Issue>) {
    let mut found = Vec::new();

    for record in &crawl.pages {
        match &record.result {
            PageResult::Html { final_url, .. } | PageResult::Other { final_url, .. }
                if !record.hops.is_empty() =>
            {
                found.push(Issue::RedirectChain {
                    url: record.url.to_string(),
                    hops: record.hops.clone(),
                    final_url: Some(final_url.to_string()),
                });
            }
            PageResult::OffSite { target } => {
                found.push(Issue::RedirectChain {
                    url: record.url.to_string(),
                    hops: record.hops.clone(),
                    final_url: Some(target.to_string()),
                });
            }
            PageResult::Failed(FetchFailure::TooManyRedirects) => {
                found.push(Issue::RedirectChain {
                    url: record.url.to_string(),
                    hops: record.hops.clone(),
                    final_url: None,
                });
            }
            _ => {}
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn canonical_pass(crawl: &CrawlOutput, issues: &mut Vec<Issue>) {
    let mut found = Vec::new();

    for record in &crawl.pages {
        let PageResult::Html { final_url, data } = &record.result else {
            continue;
        };
        match &data.canonical {
            None => found.push(Issue::MissingCanonical {
                page: record.url.to_string(),
            }),
            Some(canonical) => {
                // The page's content lives at its final (post-redirect) URL;
                // that is what the canonical must point to
                let matches = Url::parse(canonical)
                    .map(|c| normalize_url(&c) == normalize_url(final_url))
                    .unwrap_or(false);
                if !matches {
                    found.push(Issue::CanonicalMismatch {
                        page: record.url.to_string(),
                        canonical: canonical.clone(),
                    });
                }
            }
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn hreflang_pass(crawl: &CrawlOutput, config: &AuditConfig, issues: &mut Vec<Issue>) {
    if config.locales.is_empty() {
        return;
    }
    let mut found = Vec::new();

    for record in &crawl.pages {
        let PageResult::Html { data, .. } = &record.result else {
            continue;
        };
        let present: HashSet<&str> = data.alternates.iter().map(|a| a.lang.as_str()).collect();
        let mut missing: Vec<String> = config
            .locales
            .iter()
            .filter(|locale| !present.contains(locale.as_str()))
            .cloned()
            .collect();
        if !present.contains("x-default") {
            missing.push("x-default".to_string());
        }
        if !missing.is_empty() {
            found.push(Issue::MissingHreflang {
                page: record.url.to_string(),
                missing,
            });
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn orphan_pass(base: &Url, crawl: &CrawlOutput, sitemap_urls: &[Url], issues: &mut Vec<Issue>) {
    if sitemap_urls.is_empty() {
        return;
    }
    let root = normalize_url(base).to_string();
    let mut seen: HashSet<String> = HashSet::new();
    let mut found = Vec::new();

    for url in sitemap_urls {
        let normalized = normalize_url(url).to_string();
        // The root page naturally has few inbound links; don't flag it
        if normalized == root || !seen.insert(normalized.clone()) {
            continue;
        }
        let has_inbound = crawl
            .internal_refs
            .get(&normalized)
            .map(|refs| refs.iter().any(|referrer| referrer != &normalized))
            .unwrap_or(false);
        if !has_inbound {
            found.push(Issue::OrphanPage { url: normalized });
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn image_alt_pass(crawl: &CrawlOutput, issues: &mut Vec<Issue>) {
    let mut found = Vec::new();

    for record in &crawl.pages {
        let PageResult::Html { data, .. } = &record.result else {
            continue;
        };
        for src in &data.images_missing_alt {
            found.push(Issue::ImageMissingAlt {
                page: record.url.to_string(),
                src: src.clone(),
            });
        }
    }

    found.sort_by(|a, b| a.url().cmp(b.url()));
    issues.extend(found);
}

fn referrers(crawl: &CrawlOutput, url: &str) -> Vec<String> {
    crawl
        .internal_refs
        .get(url)
        .map(|refs| dedup_sorted(refs))
        .unwrap_or_default()
}

fn dedup_sorted(refs: &[String]) -> Vec<String> {
    let mut refs = refs.to_vec();
    refs.sort();
    refs.dedup();
    refs
}
