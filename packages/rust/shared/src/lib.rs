//! Shared types, error model, and configuration for MarketBrief.
//!
//! This crate is the foundation depended on by all other MarketBrief crates.
//! It provides:
//! - [`MarketBriefError`]: the unified error type
//! - Domain types ([`Run`], [`Asset`], [`Source`], [`Summary`], [`RunId`])
//! - The static asset seed ([`ASSET_SEEDS`])
//! - Configuration ([`AppConfig`], [`ProviderConfig`], config loading)

pub mod assets;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use assets::{
    ASSET_SEEDS, AssetSeed, COMMON_NEWS_DOMAINS, allowed_domains, asset_seed,
    is_valid_asset_symbol,
};
pub use config::{
    AppConfig, DefaultsConfig, FanOut, OpenAiConfig, ProviderConfig, RetryConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{ErrorBody, MarketBriefError, Result};
pub use types::{
    Asset, AssetCategory, BASE_LANGUAGE, Language, ReasoningEffort, Run, RunCompletion, RunId,
    RunKind, RunStatus, SECTION_PLACEHOLDER, SUPPORTED_LANGUAGES, Source, Summary, Verbosity,
};
