//! Domain-reputation relevance scoring.

use crate::extract_domain;

const BASE_SCORE: f64 = 0.5;
const OFFICIAL_SCORE: f64 = 1.0;
const REPUTABLE_SCORE: f64 = 0.8;
const TITLE_BOOST: f64 = 0.1;

const OFFICIAL_DOMAINS: &[&str] = &[
    "worldcoin.org",
    "circle.com",
    "wbtc.network",
    "ethereum.org",
];

const REPUTABLE_DOMAINS: &[&str] = &[
    "coindesk.com",
    "cointelegraph.com",
    "bloomberg.com",
    "reuters.com",
    "theblockcrypto.com",
];

const TITLE_KEYWORDS: &[&str] = &["price", "market", "analysis", "update", "news"];

/// Reputation tiers used to score a cited URL.
///
/// Domains match by substring containment, so `blog.worldcoin.org` counts as
/// `worldcoin.org`. Title keywords are lowercase.
#[derive(Debug, Clone)]
pub struct DomainTiers {
    pub official: Vec<String>,
    pub reputable: Vec<String>,
    pub title_keywords: Vec<String>,
}

impl Default for DomainTiers {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            official: owned(OFFICIAL_DOMAINS),
            reputable: owned(REPUTABLE_DOMAINS),
            title_keywords: owned(TITLE_KEYWORDS),
        }
    }
}

impl DomainTiers {
    /// Relevance of `url` in `[0, 1]`.
    ///
    /// Starts at 0.5, becomes 1.0 for an official domain or 0.8 for a reputable
    /// one, then gains 0.1 (capped at 1.0) when `title` mentions a keyword.
    pub fn score(&self, url: &str, title: Option<&str>) -> f64 {
        let domain = extract_domain(url);
        let matches = |list: &[String]| {
            domain
                .as_deref()
                .is_some_and(|d| list.iter().any(|entry| d.contains(entry.as_str())))
        };

        let mut score = if matches(&self.official) {
            OFFICIAL_SCORE
        } else if matches(&self.reputable) {
            REPUTABLE_SCORE
        } else {
            BASE_SCORE
        };

        if let Some(title) = title {
            let title = title.to_lowercase();
            if self.title_keywords.iter().any(|k| title.contains(k.as_str())) {
                score = (score + TITLE_BOOST).min(1.0);
            }
        }

        score
    }
}

/// Score a URL against the default tiers.
pub fn calculate_relevance_score(url: &str, title: Option<&str>) -> f64 {
    DomainTiers::default().score(url, title)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn tiers_without_title() {
        assert_eq!(calculate_relevance_score("https://worldcoin.org/x", None), 1.0);
        assert_eq!(calculate_relevance_score("https://blog.worldcoin.org/x", None), 1.0);
        assert_eq!(calculate_relevance_score("https://www.reuters.com/x", None), 0.8);
        assert_eq!(calculate_relevance_score("https://random.blog/x", None), 0.5);
        assert_eq!(calculate_relevance_score("garbage", None), 0.5);
    }

    #[test]
    fn title_keyword_boost_is_capped() {
        let s = calculate_relevance_score("https://random.blog/x", Some("WLD Price Update"));
        assert!((s - 0.6).abs() < EPS);
        let s = calculate_relevance_score("https://coindesk.com/x", Some("Market wrap"));
        assert!((s - 0.9).abs() < EPS);
        let s = calculate_relevance_score("https://circle.com/x", Some("USDC news"));
        assert_eq!(s, 1.0);
        let s = calculate_relevance_score("https://random.blog/x", Some("A long read"));
        assert_eq!(s, 0.5);
    }

    #[test]
    fn scores_are_monotonic_by_tier() {
        for title in [None, Some("price analysis"), Some("nothing relevant")] {
            let official = calculate_relevance_score("https://ethereum.org/a", title);
            let reputable = calculate_relevance_score("https://bloomberg.com/a", title);
            let unknown = calculate_relevance_score("https://example.net/a", title);
            assert!(official >= reputable, "{title:?}");
            assert!(reputable >= unknown, "{title:?}");
            for s in [official, reputable, unknown] {
                assert!((0.0..=1.0).contains(&s));
            }
        }
    }

    #[test]
    fn custom_tiers_are_additive() {
        let mut tiers = DomainTiers::default();
        tiers.reputable.push("theblock.co".into());
        assert_eq!(tiers.score("https://www.theblock.co/post", None), 0.8);
    }
}
