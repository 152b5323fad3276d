// src/config.rs
// =============================================================================
// Crawl configuration.
//
// Resolution order, weakest first:
// 1. Built-in defaults
// 2. TOML config file (if --config was given)
// 3. Explicit CLI flags
//
// Invalid TOML and invalid glob patterns are hard errors (exit code 2);
// a misconfigured CI job should fail loudly, not crawl the wrong thing.
// =============================================================================

use crate::cli::CrawlOpts;
use anyhow::{Context, Result};
use glob::Pattern;
use serde::Deserialize;
use std::fs;
use url::Url;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SITEMAP_PATH: &str = "/sitemap.xml";
pub const DEFAULT_USER_AGENT: &str = concat!("site-sentinel/", env!("CARGO_PKG_VERSION"));

/// Fully-resolved crawl settings, shared by every stage of a run.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub concurrency: usize,
    pub max_depth: usize,
    pub max_redirects: usize,
    pub timeout_secs: u64,
    pub sitemap_path: String,
    pub user_agent: String,
    /// Expected hreflang locales, lowercased. Empty disables the hreflang pass.
    pub locales: Vec<String>,
    /// Compiled glob patterns matched against URL paths.
    pub exclude: Vec<Pattern>,
    pub check_external: bool,
}

/// Raw shape of the TOML config file. Every field is optional so users only
/// write the knobs they care about.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    concurrency: Option<usize>,
    max_depth: Option<usize>,
    max_redirects: Option<usize>,
    timeout_secs: Option<u64>,
    sitemap_path: Option<String>,
    user_agent: Option<String>,
    locales: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    check_external: Option<bool>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            concurrency: DEFAULT_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            sitemap_path: DEFAULT_SITEMAP_PATH.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locales: Vec::new(),
            exclude: Vec::new(),
            check_external: true,
        }
    }
}

impl AuditConfig {
    /// Builds the effective configuration from defaults, the optional config
    /// file, and CLI flags.
    pub fn resolve(opts: &CrawlOpts) -> Result<Self> {
        let file = match &opts.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str::<ConfigFile>(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => ConfigFile::default(),
        };

        // CLI locales replace the file list entirely; mixing the two would
        // make it impossible to narrow the set from the command line.
        let locales = if opts.locales.is_empty() {
            file.locales.unwrap_or_default()
        } else {
            opts.locales.clone()
        };
        let locales: Vec<String> = locales.into_iter().map(|l| l.to_ascii_lowercase()).collect();

        // Exclude patterns accumulate: file patterns plus CLI patterns.
        let mut raw_patterns = file.exclude.unwrap_or_default();
        raw_patterns.extend(opts.excludes.iter().cloned());
        let exclude = raw_patterns
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("invalid exclude pattern '{}'", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(AuditConfig {
            concurrency: opts
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY)
                .max(1),
            max_depth: opts.max_depth.or(file.max_depth).unwrap_or(DEFAULT_MAX_DEPTH).max(1),
            max_redirects: opts
                .max_redirects
                .or(file.max_redirects)
                .unwrap_or(DEFAULT_MAX_REDIRECTS),
            timeout_secs: opts.timeout.or(file.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS),
            sitemap_path: opts
                .sitemap
                .clone()
                .or(file.sitemap_path)
                .unwrap_or_else(|| DEFAULT_SITEMAP_PATH.to_string()),
            user_agent: file.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            locales,
            exclude,
            check_external: !opts.no_external && file.check_external.unwrap_or(true),
        })
    }

    /// Whether a URL's path matches any exclude pattern.
    pub fn is_excluded(&self, url: &Url) -> bool {
        self.exclude.iter().any(|p| p.matches(url.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn opts() -> CrawlOpts {
        CrawlOpts::default()
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file_or_flags() {
        let config = AuditConfig::resolve(&opts()).unwrap();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.sitemap_path, "/sitemap.xml");
        assert!(config.locales.is_empty());
        assert!(config.check_external);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = write_config(
            r#"
            concurrency = 8
            max_depth = 2
            locales = ["EN", "De"]
            sitemap_path = "/sitemap_index.xml"
            "#,
        );
        let mut opts = opts();
        opts.config = Some(file.path().to_path_buf());

        let config = AuditConfig::resolve(&opts).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.sitemap_path, "/sitemap_index.xml");
        // Locales are lowercased on load
        assert_eq!(config.locales, vec!["en", "de"]);
    }

    #[test]
    fn test_cli_flags_win_over_file() {
        let file = write_config("concurrency = 8\nmax_depth = 2\n");
        let mut opts = opts();
        opts.config = Some(file.path().to_path_buf());
        opts.concurrency = Some(3);

        let config = AuditConfig::resolve(&opts).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.max_depth, 2);
    }

    #[test]
    fn test_cli_locales_replace_file_locales() {
        let file = write_config(r#"locales = ["en", "de", "fr"]"#);
        let mut opts = opts();
        opts.config = Some(file.path().to_path_buf());
        opts.locales = vec!["IT".to_string()];

        let config = AuditConfig::resolve(&opts).unwrap();
        assert_eq!(config.locales, vec!["it"]);
    }

    #[test]
    fn test_exclude_patterns_accumulate_and_match() {
        let file = write_config(r#"exclude = ["/admin/*"]"#);
        let mut opts = opts();
        opts.config = Some(file.path().to_path_buf());
        opts.excludes = vec!["/drafts/*".to_string()];

        let config = AuditConfig::resolve(&opts).unwrap();
        assert!(config.is_excluded(&Url::parse("https://example.com/admin/users").unwrap()));
        assert!(config.is_excluded(&Url::parse("https://example.com/drafts/post-1").unwrap()));
        assert!(!config.is_excluded(&Url::parse("https://example.com/pricing").unwrap()));
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let mut opts = opts();
        opts.excludes = vec!["/bad/[pattern".to_string()];
        assert!(AuditConfig::resolve(&opts).is_err());
    }

    #[test]
    fn test_unknown_config_key_is_an_error() {
        let file = write_config("concurency = 8\n");
        let mut opts = opts();
        opts.config = Some(file.path().to_path_buf());
        assert!(AuditConfig::resolve(&opts).is_err());
    }

    #[test]
    fn test_no_external_flag() {
        let mut opts = opts();
        opts.no_external = true;
        let config = AuditConfig::resolve(&opts).unwrap();
        assert!(!config.check_external);
    }

    #[test]
    fn test_concurrency_clamped_to_at_least_one() {
        let mut opts = opts();
        opts.concurrency = Some(0);
        let config = AuditConfig::resolve(&opts).unwrap();
        assert_eq!(config.concurrency, 1);
    }
}
