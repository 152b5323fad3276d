// src/crawl/mod.rs
// =============================================================================
// Crawling: HTTP fetching with observable redirect chains, and the
// breadth-first frontier engine that walks the internal link graph.
// =============================================================================

mod fetch;
mod frontier;

pub use fetch::{
    build_follow_client, verify_links, CheckedLink, FetchFailure, RedirectHop,
};
pub use frontier::{crawl, normalize_url, CrawlOutput, PageRecord, PageResult};
