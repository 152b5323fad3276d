// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - audit: full crawl with every SEO pass (canonical, hreflang, orphans, ...)
// - links: crawl + broken-link verification only
//
// Both share the same crawl knobs, grouped in CrawlOpts and flattened into
// each subcommand so they appear after the subcommand on the command line.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-sentinel",
    version,
    about = "Crawl a website and report broken links, redirect chains, and SEO metadata issues",
    long_about = "site-sentinel walks a site's internal link graph breadth-first with a bounded \
                  fetch pool and reports link-health and SEO issues. It is designed for CI \
                  pipelines: exit code 0 means clean, 1 means issues were found, 2 means an \
                  internal error."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v = info, -vv = debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Full site audit: sitemap-seeded crawl plus every classification pass
    ///
    /// Example: site-sentinel audit https://example.com --locale en --locale de
    Audit {
        /// Base URL of the site to audit (e.g. https://example.com)
        base_url: String,

        #[command(flatten)]
        opts: CrawlOpts,
    },

    /// Broken-link check only: crawl internal pages and verify link targets
    ///
    /// Example: site-sentinel links https://example.com --max-depth 2
    Links {
        /// Base URL of the site to check (e.g. https://example.com)
        base_url: String,

        #[command(flatten)]
        opts: CrawlOpts,
    },
}

/// Crawl knobs shared by every subcommand.
///
/// Every option is optional here; defaults and the config file are applied in
/// `config::AuditConfig::resolve`, with explicit CLI flags winning.
#[derive(Args, Debug, Default)]
pub struct CrawlOpts {
    /// Output the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent fetches (default: 5)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Maximum crawl depth; 1 = just the seed pages (default: 3)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum redirect hops to follow per fetch (default: 5)
    #[arg(long)]
    pub max_redirects: Option<usize>,

    /// Per-request timeout in seconds (default: 10)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Sitemap path relative to the base URL (default: /sitemap.xml)
    #[arg(long)]
    pub sitemap: Option<String>,

    /// Expected hreflang locale, repeatable (audit only; e.g. --locale en)
    #[arg(long = "locale")]
    pub locales: Vec<String>,

    /// Glob pattern for URL paths to skip, repeatable (e.g. --exclude '/admin/*')
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,

    /// Do not verify external link targets
    #[arg(long)]
    pub no_external: bool,
}
