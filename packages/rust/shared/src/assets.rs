//! The static asset set every deployment is seeded with.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::types::{Asset, AssetCategory};

/// Static definition of a seeded asset.
#[derive(Debug, Clone, Copy)]
pub struct AssetSeed {
    pub symbol: &'static str,
    pub name: &'static str,
    pub category: AssetCategory,
    pub chains: &'static [&'static str],
    pub official_urls: &'static [(&'static str, &'static str)],
    /// Asset-specific domains preferred as sources on comprehensive runs.
    pub preferred_domains: &'static [&'static str],
}

/// Seeded assets, in display order.
pub const ASSET_SEEDS: &[AssetSeed] = &[
    AssetSeed {
        symbol: "WLD",
        name: "Worldcoin",
        category: AssetCategory::Coin,
        chains: &["Ethereum", "Optimism"],
        official_urls: &[
            ("website", "https://worldcoin.org"),
            ("blog", "https://blog.worldcoin.org"),
            ("docs", "https://docs.worldcoin.org"),
        ],
        preferred_domains: &["worldcoin.org", "blog.worldcoin.org"],
    },
    AssetSeed {
        symbol: "USDC",
        name: "USD Coin",
        category: AssetCategory::Stable,
        chains: &["Ethereum", "Polygon", "Avalanche", "Solana"],
        official_urls: &[
            ("website", "https://www.circle.com/en/usdc"),
            ("docs", "https://developers.circle.com"),
        ],
        preferred_domains: &["circle.com", "coinbase.com"],
    },
    AssetSeed {
        symbol: "WBTC",
        name: "Wrapped Bitcoin",
        category: AssetCategory::Wrapped,
        chains: &["Ethereum"],
        official_urls: &[
            ("website", "https://wbtc.network"),
            ("docs", "https://wbtc.network/dashboard/transparency"),
        ],
        preferred_domains: &["wbtc.network"],
    },
    AssetSeed {
        symbol: "WETH",
        name: "Wrapped Ether",
        category: AssetCategory::Wrapped,
        chains: &["Ethereum"],
        official_urls: &[
            ("website", "https://weth.io"),
            (
                "contract",
                "https://etherscan.io/token/0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
            ),
        ],
        preferred_domains: &["ethereum.org", "etherscan.io"],
    },
];

/// News outlets preferred as sources for every asset on comprehensive runs.
pub const COMMON_NEWS_DOMAINS: &[&str] = &[
    "coindesk.com",
    "cointelegraph.com",
    "bloomberg.com",
    "reuters.com",
    "theblockcrypto.com",
];

impl AssetSeed {
    /// Materialize a fresh [`Asset`] row for this seed.
    pub fn to_asset(&self) -> Asset {
        Asset {
            id: Uuid::now_v7().to_string(),
            symbol: self.symbol.to_string(),
            name: self.name.to_string(),
            category: self.category,
            chains: self.chains.iter().map(|c| c.to_string()).collect(),
            official_urls: self
                .official_urls
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            created_at: Utc::now(),
        }
    }
}

/// Find the seed for a symbol (case-insensitive).
pub fn asset_seed(symbol: &str) -> Option<&'static AssetSeed> {
    ASSET_SEEDS
        .iter()
        .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
}

/// Whether `symbol` belongs to the seeded asset set (case-insensitive).
pub fn is_valid_asset_symbol(symbol: &str) -> bool {
    asset_seed(symbol).is_some()
}

/// Common news domains followed by the asset-specific ones.
pub fn allowed_domains(symbol: &str) -> Vec<String> {
    let specific = asset_seed(symbol)
        .map(|s| s.preferred_domains)
        .unwrap_or_default();

    COMMON_NEWS_DOMAINS
        .iter()
        .chain(specific.iter())
        .map(|d| d.to_string())
        .collect()
}
