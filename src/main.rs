// src/main.rs
// =============================================================================
// Entry point of the CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Initialize logging (diagnostics go to stderr via the log facade)
// 3. Dispatch to the subcommand handler: audit or links
// 4. Print the report and exit with the right code
//    (0 = clean, 1 = issues found, 2 = internal error)
// =============================================================================

mod analyze;
mod cli;
mod config;
mod crawl;
mod report;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use url::Url;

use cli::{Cli, Commands, CrawlOpts};
use config::AuditConfig;
use report::AuditMode;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // The handle must stay alive for the lifetime of the program, or the
    // logger shuts down
    let _logger = init_logging(cli.verbose)?;

    match cli.command {
        Commands::Audit { base_url, opts } => run_audit(&base_url, &opts).await,
        Commands::Links { base_url, opts } => run_links(&base_url, &opts).await,
    }
}

fn init_logging(verbose: u8) -> Result<flexi_logger::LoggerHandle> {
    let spec = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    flexi_logger::Logger::try_with_env_or_str(spec)
        .context("invalid log specification")?
        .start()
        .context("starting logger")
}

/// Handles the 'audit' subcommand: sitemap-seeded crawl plus every
/// classification pass.
async fn run_audit(base_url: &str, opts: &CrawlOpts) -> Result<i32> {
    let config = AuditConfig::resolve(opts)?;
    let base = parse_base_url(base_url)?;

    if !opts.json {
        println!("🔍 Auditing {}", base);
    }

    let follow_client = crawl::build_follow_client(&config)?;
    let sitemap_urls = analyze::fetch_sitemap(&follow_client, &base, &config.sitemap_path).await;
    if !opts.json && !sitemap_urls.is_empty() {
        println!("🗺️  Sitemap lists {} URL(s)", sitemap_urls.len());
    }

    // Seed with the base URL plus everything the sitemap lists, so pages
    // reachable only through the sitemap still get crawled
    let mut seeds = vec![base.clone()];
    seeds.extend(sitemap_urls.iter().cloned());

    let output = crawl::crawl(&base, seeds, &config).await?;
    if !opts.json {
        println!("📄 Crawled {} page(s)", output.pages.len());
    }

    let targets = report::pending_link_targets(&base, &output, &config);
    if !opts.json && !targets.is_empty() {
        println!("🌐 Checking {} link target(s)...", targets.len());
    }
    let checked = crawl::verify_links(&follow_client, targets, config.concurrency).await;

    let report = report::classify(
        &base,
        &output,
        &sitemap_urls,
        &checked,
        &config,
        AuditMode::Full,
    );
    report::print_report(&report, opts.json)?;

    Ok(if report.issues.is_empty() { 0 } else { 1 })
}

/// Handles the 'links' subcommand: crawl and verify link targets, skipping
/// the SEO passes.
async fn run_links(base_url: &str, opts: &CrawlOpts) -> Result<i32> {
    let config = AuditConfig::resolve(opts)?;
    let base = parse_base_url(base_url)?;

    if !opts.json {
        println!("🔍 Checking links on {}", base);
    }

    let output = crawl::crawl(&base, vec![base.clone()], &config).await?;
    if !opts.json {
        println!("📄 Crawled {} page(s)", output.pages.len());
    }

    let follow_client = crawl::build_follow_client(&config)?;
    let targets = report::pending_link_targets(&base, &output, &config);
    if !opts.json && !targets.is_empty() {
        println!("🌐 Checking {} link target(s)...", targets.len());
    }
    let checked = crawl::verify_links(&follow_client, targets, config.concurrency).await;

    let report = report::classify(&base, &output, &[], &checked, &config, AuditMode::LinksOnly);
    report::print_report(&report, opts.json)?;

    Ok(if report.issues.is_empty() { 0 } else { 1 })
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid base URL '{}'", raw))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "base URL must be http or https: {}",
        raw
    );
    ensure!(url.host_str().is_some(), "base URL has no host: {}", raw);
    Ok(url)
}
