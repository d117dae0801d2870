//! URL normalization, identity hashing and relevance scoring for cited sources.
//!
//! Every function here is pure and infallible: an unparseable URL falls back to
//! the input string (normalization) or `None` (domain) rather than erroring.

mod scoring;

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

pub use scoring::{DomainTiers, calculate_relevance_score};

/// Reduce a URL to `scheme://host[:port]/path`, dropping query and fragment.
///
/// Returns the input unchanged when it cannot be parsed or has no host.
pub fn normalize_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    match parsed.port() {
        Some(port) => format!("{}://{host}:{port}{}", parsed.scheme(), parsed.path()),
        None => format!("{}://{host}{}", parsed.scheme(), parsed.path()),
    }
}

/// Hostname of a URL, or `None` when it cannot be parsed.
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
}

/// Lowercase hex SHA-256 of a string.
pub fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A cited URL ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSource {
    /// URL as it appeared in the generated text.
    pub original_url: String,
    pub normalized_url: String,
    pub domain: Option<String>,
    /// [`hash_string`] of the normalized URL.
    pub hash: String,
    pub relevance_score: f64,
}

/// Normalize, de-duplicate and score a list of extracted URLs.
///
/// URLs that normalize identically collapse into one entry; the first
/// occurrence wins and input order is preserved.
pub fn collect_sources(urls: &[String], tiers: &DomainTiers) -> Vec<ScoredSource> {
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(urls.len());

    for url in urls {
        let normalized_url = normalize_url(url);
        let hash = hash_string(&normalized_url);
        if !seen.insert(hash.clone()) {
            debug!(%url, "duplicate source after normalization");
            continue;
        }

        sources.push(ScoredSource {
            original_url: url.clone(),
            domain: extract_domain(url),
            relevance_score: tiers.score(url, None),
            normalized_url,
            hash,
        });
    }

    sources
}
