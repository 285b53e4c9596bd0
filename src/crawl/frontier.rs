// src/crawl/frontier.rs
// =============================================================================
// The frontier: every URL that has been claimed for processing.
//
// A claim is a single check-and-insert under one lock, so two workers that
// dequeue the same URL can never both download it. Claims are permanent for
// the lifetime of a crawl.
//
// Before membership tests every URL is canonicalized:
// - scheme + host (+ port) + path, query and fragment dropped
// - trailing slash removed, except for the root path "/"
// - only http and https are crawlable
// =============================================================================

use std::collections::HashSet;

use parking_lot::Mutex;
use url::Url;

use crate::error::PipelineError;

/// Parses `raw` and reduces it to the canonical form used for dedup.
///
/// Returns None for unparseable URLs and non-http(s) schemes.
pub fn canonicalize(raw: &str) -> Option<Url> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    url.set_query(None);
    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
        let trimmed = trimmed.to_string();
        url.set_path(&trimmed);
    }

    Some(url)
}

/// Normalizes the seed URL: parse, require http(s), force a trailing slash.
pub fn normalize_seed(raw: &str) -> Result<Url, PipelineError> {
    let invalid = |reason: String| PipelineError::InvalidSeed {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("URL has no host".to_string()));
    }

    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Restricts the crawl to the seed's host.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    host: String,
}

impl CrawlScope {
    pub fn new(seed: &Url) -> Self {
        Self {
            host: seed.host_str().unwrap_or_default().to_ascii_lowercase(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn contains(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url
                .host_str()
                .is_some_and(|host| host.eq_ignore_ascii_case(&self.host))
    }
}

/// Set of claimed canonical URLs.
#[derive(Debug, Default)]
pub struct Frontier {
    claimed: Mutex<HashSet<String>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claims `url`.
    ///
    /// Returns true for exactly one caller per canonical URL. Malformed URLs
    /// are rejected without touching the set.
    pub fn try_claim(&self, url: &str) -> bool {
        let Some(canonical) = canonicalize(url) else {
            return false;
        };
        self.claimed.lock().insert(canonical.into())
    }

    /// Snapshot membership test. Not a substitute for `try_claim`.
    pub fn is_claimed(&self, url: &str) -> bool {
        canonicalize(url)
            .map(|canonical| self.claimed.lock().contains(canonical.as_str()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().len()
    }
}
