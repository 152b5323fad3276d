// src/crawl/fetch.rs
// =============================================================================
// HTTP fetching for the crawl.
//
// Key functionality:
// - Fetches pages with redirect following DISABLED and walks Location
//   headers itself, so every hop of a redirect chain is observed
// - Bounds the chain at max_redirects hops and guards against cycles
// - Stops (without fetching) when a chain leaves the site's host
// - Verifies link targets with HEAD, falling back to GET when the server
//   rejects HEAD
// - Classifies transport failures (timeout, DNS, TLS, ...) into data the
//   report can aggregate, instead of bubbling them up as errors
// =============================================================================

use anyhow::Result;
use futures::stream::{self, StreamExt};
use log::debug;
use reqwest::{header, redirect, Client, StatusCode};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::config::AuditConfig;

/// One step of a redirect chain: the URL that answered and the 3xx status
/// it answered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
}

/// Why a fetch (or a link verification) did not produce a usable response.
///
/// These are data, not errors: a broken link is a finding, and the crawl
/// keeps going.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    /// Request timed out
    Timeout,
    /// Could not resolve hostname
    Dns,
    /// TCP connection failed
    Connect,
    /// TLS certificate problem
    Tls,
    /// Redirect hop limit exceeded, or the chain revisited a URL
    TooManyRedirects,
    /// Terminal response with a non-2xx, non-3xx status
    Http { status: u16 },
    /// Anything else reqwest reports
    Other { message: String },
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Timeout => write!(f, "request timed out"),
            FetchFailure::Dns => write!(f, "could not resolve hostname"),
            FetchFailure::Connect => write!(f, "connection failed"),
            FetchFailure::Tls => write!(f, "TLS certificate error"),
            FetchFailure::TooManyRedirects => write!(f, "redirect limit exceeded"),
            FetchFailure::Http { status } => write!(f, "HTTP {}", status),
            FetchFailure::Other { message } => write!(f, "{}", message),
        }
    }
}

/// Outcome of fetching one page during the crawl.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Terminal 2xx response with an HTML body.
    Html {
        final_url: Url,
        hops: Vec<RedirectHop>,
        body: String,
    },
    /// Terminal 2xx response with a non-HTML body (PDF, image, feed, ...).
    /// Recorded but never parsed.
    Resource {
        final_url: Url,
        hops: Vec<RedirectHop>,
        content_type: Option<String>,
    },
    /// The redirect chain left the site's host; `target` was not fetched.
    OffSite { target: Url, hops: Vec<RedirectHop> },
    /// No usable response.
    Failed {
        failure: FetchFailure,
        hops: Vec<RedirectHop>,
    },
}

/// Result of verifying a single link target (external, or internal but
/// never crawled).
#[derive(Debug, Clone)]
pub struct CheckedLink {
    pub url: String,
    /// Pages the link was found on.
    pub referrers: Vec<String>,
    /// None means the target answered successfully.
    pub failure: Option<FetchFailure>,
}

/// Page fetcher used by the crawl engine. Follows redirects by hand so the
/// chain can be recorded hop by hop.
pub struct Fetcher {
    client: Client,
    max_redirects: usize,
    host: String,
}

impl Fetcher {
    pub fn new(config: &AuditConfig, host: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Fetcher {
            client,
            max_redirects: config.max_redirects,
            host: host.to_string(),
        })
    }

    /// Fetches a page, following its redirect chain one hop at a time.
    pub async fn fetch_page(&self, url: &Url) -> FetchOutcome {
        let mut hops: Vec<RedirectHop> = Vec::new();
        // URLs already seen in this chain; revisiting one means a cycle
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = url.clone();

        loop {
            if !seen.insert(current.to_string()) {
                return FetchOutcome::Failed {
                    failure: FetchFailure::TooManyRedirects,
                    hops,
                };
            }

            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) => {
                    return FetchOutcome::Failed {
                        failure: classify_transport(&e),
                        hops,
                    }
                }
            };

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok());
                let Some(location) = location else {
                    // A 3xx without a Location header goes nowhere
                    return FetchOutcome::Failed {
                        failure: FetchFailure::Http {
                            status: status.as_u16(),
                        },
                        hops,
                    };
                };
                let next = match current.join(location) {
                    Ok(next) => next,
                    Err(_) => {
                        return FetchOutcome::Failed {
                            failure: FetchFailure::Other {
                                message: format!("unparseable redirect target '{}'", location),
                            },
                            hops,
                        }
                    }
                };

                debug!("redirect {} {} -> {}", status.as_u16(), current, next);
                hops.push(RedirectHop {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
                if hops.len() > self.max_redirects {
                    return FetchOutcome::Failed {
                        failure: FetchFailure::TooManyRedirects,
                        hops,
                    };
                }

                // External pages are never crawled; report where the chain went
                if next.host_str() != Some(self.host.as_str()) {
                    return FetchOutcome::OffSite { target: next, hops };
                }
                current = next;
                continue;
            }

            if !status.is_success() {
                return FetchOutcome::Failed {
                    failure: FetchFailure::Http {
                        status: status.as_u16(),
                    },
                    hops,
                };
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            let is_html = content_type
                .as_deref()
                .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
                .unwrap_or(false);

            if !is_html {
                return FetchOutcome::Resource {
                    final_url: current,
                    hops,
                    content_type,
                };
            }

            return match response.text().await {
                Ok(body) => FetchOutcome::Html {
                    final_url: current,
                    hops,
                    body,
                },
                Err(e) => FetchOutcome::Failed {
                    failure: classify_transport(&e),
                    hops,
                },
            };
        }
    }
}

/// Builds the redirect-following client used for sitemap fetching and link
/// verification, where chain detail does not matter.
pub fn build_follow_client(config: &AuditConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(redirect::Policy::limited(config.max_redirects.max(1)))
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Verifies link targets concurrently through the bounded pool.
///
/// Targets are (url, referrers) pairs; results come back in completion
/// order, which is fine because the report sorts them.
pub async fn verify_links(
    client: &Client,
    targets: Vec<(String, Vec<String>)>,
    concurrency: usize,
) -> Vec<CheckedLink> {
    stream::iter(
        targets
            .into_iter()
            .map(|(url, referrers)| check_one(client, url, referrers)),
    )
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

/// Checks a single link target with HEAD, retrying with GET when the server
/// rejects the method.
async fn check_one(client: &Client, url: String, referrers: Vec<String>) -> CheckedLink {
    let failure = match client.head(&url).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                None
            } else if matches!(status, StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED)
            {
                match client.get(&url).send().await {
                    Ok(response) if response.status().is_success() => None,
                    Ok(response) => Some(FetchFailure::Http {
                        status: response.status().as_u16(),
                    }),
                    Err(e) => Some(classify_transport(&e)),
                }
            } else {
                Some(FetchFailure::Http {
                    status: status.as_u16(),
                })
            }
        }
        Err(e) => Some(classify_transport(&e)),
    };

    CheckedLink {
        url,
        referrers,
        failure,
    }
}

/// Maps a reqwest transport error onto the failure taxonomy.
fn classify_transport(error: &reqwest::Error) -> FetchFailure {
    let text = error.to_string();

    if error.is_timeout() {
        FetchFailure::Timeout
    } else if error.is_redirect() {
        FetchFailure::TooManyRedirects
    } else if error.is_connect() {
        // reqwest reports DNS failures as connect errors; the message is the
        // only way to tell them apart
        if text.contains("dns") {
            FetchFailure::Dns
        } else {
            FetchFailure::Connect
        }
    } else if text.contains("certificate") || text.contains("ssl") || text.contains("tls") {
        FetchFailure::Tls
    } else {
        FetchFailure::Other { message: text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_messages() {
        assert_eq!(FetchFailure::Timeout.to_string(), "request timed out");
        assert_eq!(FetchFailure::Http { status: 404 }.to_string(), "HTTP 404");
        assert_eq!(
            FetchFailure::TooManyRedirects.to_string(),
            "redirect limit exceeded"
        );
    }

    #[test]
    fn test_failure_serializes_with_kind_tag() {
        let json = serde_json::to_value(FetchFailure::Http { status: 404 }).unwrap();
        assert_eq!(json["kind"], "http");
        assert_eq!(json["status"], 404);

        let json = serde_json::to_value(FetchFailure::Timeout).unwrap();
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn test_redirect_hop_serializes() {
        let hop = RedirectHop {
            url: "https://example.com/old".to_string(),
            status: 301,
        };
        let json = serde_json::to_value(&hop).unwrap();
        assert_eq!(json["url"], "https://example.com/old");
        assert_eq!(json["status"], 301);
    }
}
