// src/report/render.rs
// =============================================================================
// Report output: a human-readable table with an emoji summary, or pretty
// JSON for CI artifacts. Everything here writes to stdout; diagnostics go
// through the log facade elsewhere so JSON output stays parseable.
// =============================================================================

use anyhow::Result;

use crate::report::issues::{Issue, Report};

/// Prints the report either as a table or as JSON.
pub fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &Report) {
    if report.issues.is_empty() {
        println!("✅ No issues found");
    } else {
        println!("{:<26} {:<58} {}", "ISSUE", "URL", "DETAIL");
        println!("{}", "=".repeat(110));
        for issue in &report.issues {
            println!(
                "{:<26} {:<58} {}",
                issue_label(issue),
                truncate(issue.url(), 55),
                issue_detail(issue)
            );
        }
    }

    println!();
    println!("📊 Summary:");
    println!("   📄 Pages crawled: {}", report.pages_crawled);
    println!("   🔗 Links checked: {}", report.links_checked);
    for (label, count) in kind_counts(&report.issues) {
        println!("   {}: {}", label, count);
    }
    println!("   📋 Total issues: {}", report.issues.len());
}

fn issue_label(issue: &Issue) -> &'static str {
    match issue {
        Issue::BrokenLink { .. } => "❌ BROKEN LINK",
        Issue::RedirectChain { .. } => "🔀 REDIRECT CHAIN",
        Issue::MissingCanonical { .. } => "🔖 NO CANONICAL",
        Issue::CanonicalMismatch { .. } => "🔖 CANONICAL MISMATCH",
        Issue::MissingHreflang { .. } => "🌍 MISSING HREFLANG",
        Issue::OrphanPage { .. } => "🏝️  ORPHAN PAGE",
        Issue::ImageMissingAlt { .. } => "🖼️  MISSING ALT",
    }
}

fn issue_detail(issue: &Issue) -> String {
    match issue {
        Issue::BrokenLink {
            reason, found_on, ..
        } => {
            if found_on.is_empty() {
                reason.clone()
            } else {
                format!("{} (linked from {} page(s))", reason, found_on.len())
            }
        }
        Issue::RedirectChain {
            hops, final_url, ..
        } => match final_url {
            Some(target) => format!("{} hop(s) -> {}", hops.len(), target),
            None => format!("{} hop(s), never resolved", hops.len()),
        },
        Issue::MissingCanonical { .. } => "no <link rel=\"canonical\">".to_string(),
        Issue::CanonicalMismatch { canonical, .. } => format!("points to {}", canonical),
        Issue::MissingHreflang { missing, .. } => format!("missing: {}", missing.join(", ")),
        Issue::OrphanPage { .. } => "in sitemap but no inbound links".to_string(),
        Issue::ImageMissingAlt { src, .. } => src.clone(),
    }
}

/// Issue counts per label, in first-seen order.
fn kind_counts(issues: &[Issue]) -> Vec<(&'static str, usize)> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for issue in issues {
        let label = issue_label(issue);
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }
    counts
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("https://example.com", 55), "https://example.com");
    }

    #[test]
    fn test_truncate_long_text() {
        let long = "x".repeat(80);
        let out = truncate(&long, 55);
        assert_eq!(out.len(), 58);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_issue_detail_broken_link() {
        let issue = Issue::BrokenLink {
            url: "https://example.com/missing".to_string(),
            reason: "HTTP 404".to_string(),
            found_on: vec!["https://example.com/".to_string()],
        };
        assert_eq!(issue_detail(&issue), "HTTP 404 (linked from 1 page(s))");
    }

    #[test]
    fn test_issue_detail_unresolved_chain() {
        let issue = Issue::RedirectChain {
            url: "https://example.com/loop".to_string(),
            hops: Vec::new(),
            final_url: None,
        };
        assert_eq!(issue_detail(&issue), "0 hop(s), never resolved");
    }

    #[test]
    fn test_kind_counts_groups_by_label() {
        let issues = vec![
            Issue::OrphanPage {
                url: "https://example.com/a".to_string(),
            },
            Issue::OrphanPage {
                url: "https://example.com/b".to_string(),
            },
            Issue::MissingCanonical {
                page: "https://example.com/c".to_string(),
            },
        ];
        let counts = kind_counts(&issues);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].1, 2);
        assert_eq!(counts[1].1, 1);
    }
}
