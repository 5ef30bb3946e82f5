//! HTTP fetcher for source pages.
//!
//! Fetches a page, guards against private/loopback targets, and reduces the
//! HTML to prompt text through `milesdesk-markdown`.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;

use milesdesk_markdown::{ExtractOptions, extract_text};
use milesdesk_shared::{MilesdeskError, Result, Source, ToolsConfig};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("Milesdesk/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A fetched page with its extracted text.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL requested.
    pub url: String,
    pub title: Option<String>,
    /// Raw response body.
    pub html: String,
    /// Cleaned page text.
    pub text: String,
    /// SHA-256 of the raw body, hex encoded.
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
    pub status_code: u16,
}

/// A page fetched for a configured source.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub source: Source,
    pub page: FetchedPage,
}

/// A source whose fetch failed.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub source: Source,
    pub error: String,
}

/// Outcome of [`Fetcher::fetch_all`].
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Successfully fetched pages, in source order.
    pub pages: Vec<SourcePage>,
    /// Sources that could not be fetched.
    pub failures: Vec<FetchFailure>,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Fetches source pages and extracts their text.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    /// Allow localhost/private IPs (local mirrors and mock servers).
    allow_private_hosts: bool,
}

impl Fetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| MilesdeskError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_private_hosts: false,
        })
    }

    /// Create a fetcher from the `[tools]` config section.
    pub fn from_config(config: &ToolsConfig) -> Result<Self> {
        Ok(Self::new(Duration::from_secs(config.fetch_timeout_secs))?
            .allow_private_hosts(config.allow_private_hosts))
    }

    /// Allow or forbid fetching localhost/private addresses.
    pub fn allow_private_hosts(mut self, allow: bool) -> Self {
        self.allow_private_hosts = allow;
        self
    }

    /// Fetch a single page and extract its text.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url).map_err(|e| MilesdeskError::parse(format!("{url}: {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&parsed) {
            warn!(%url, "SSRF protection: blocked");
            return Err(MilesdeskError::Network(format!(
                "{url}: refusing to fetch a private or non-HTTP address"
            )));
        }

        debug!(%url, "fetching page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| MilesdeskError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MilesdeskError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MilesdeskError::Network(format!("{url}: body read failed: {e}")))?;

        let opts = ExtractOptions {
            source_url: Some(parsed.to_string()),
        };
        let (text, title) = match extract_text(&body, &opts) {
            Ok(page) if !page.text.trim().is_empty() => (page.text, page.title),
            Ok(page) => (body_text(&body), page.title),
            Err(e) => {
                warn!(%url, error = %e, "extraction failed, using raw body text");
                (body_text(&body), None)
            }
        };

        debug!(%url, chars = text.chars().count(), "page fetched");

        Ok(FetchedPage {
            url: parsed.to_string(),
            title,
            content_hash: compute_hash(&body),
            html: body,
            text,
            fetched_at: Utc::now(),
            status_code: status.as_u16(),
        })
    }

    /// Fetch every source concurrently.
    ///
    /// One task is spawned per source and all are joined before returning.
    /// A failed fetch is logged and reported in [`FetchReport::failures`];
    /// it never prevents the other sources from succeeding.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn fetch_all(&self, sources: &[Source]) -> FetchReport {
        let handles: Vec<_> = sources
            .iter()
            .map(|source| {
                let fetcher = self.clone();
                let url = source.url.clone();
                (
                    source.clone(),
                    tokio::spawn(async move { fetcher.fetch(&url).await }),
                )
            })
            .collect();

        let mut report = FetchReport::default();
        for (source, handle) in handles {
            match handle.await {
                Ok(Ok(page)) => report.pages.push(SourcePage { source, page }),
                Ok(Err(e)) => {
                    warn!(source = %source.id, url = %source.url, error = %e, "fetch failed, dropping source");
                    report.failures.push(FetchFailure {
                        source,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(source = %source.id, error = %e, "fetch task failed, dropping source");
                    report.failures.push(FetchFailure {
                        source,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            fetched = report.pages.len(),
            failed = report.failures.len(),
            "source fetch completed"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whitespace-collapsed text of `<body>`, used when extraction yields nothing.
fn body_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let Ok(body_sel) = Selector::parse("body") else {
        return String::new();
    };

    doc.select(&body_sel)
        .flat_map(|body| body.text())
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
