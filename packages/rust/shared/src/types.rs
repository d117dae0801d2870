//! Core domain types for MarketBrief runs, assets, sources and summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MarketBriefError;

/// Placeholder persisted for a summary section the model did not produce.
pub const SECTION_PLACEHOLDER: &str = "N/A";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable, fresh per run).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// String-backed enums
// ---------------------------------------------------------------------------

/// Implements `as_str`, `Display` and `FromStr` for a unit-only enum.
macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable lowercase name, as stored and serialized.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = MarketBriefError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(MarketBriefError::parse(format!(
                        concat!("unknown ", $label, " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Which scheduled job produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Hourly,
    Daily,
}

string_enum!(RunKind, "run kind", { Hourly => "hourly", Daily => "daily" });

impl RunKind {
    /// Reasoning effort requested from the provider: deeper for daily runs.
    pub fn reasoning_effort(&self) -> ReasoningEffort {
        match self {
            Self::Hourly => ReasoningEffort::Low,
            Self::Daily => ReasoningEffort::Medium,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        match self {
            Self::Hourly => Verbosity::Low,
            Self::Daily => Verbosity::Medium,
        }
    }

    /// Fixed confidence attached to every summary of this kind.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Hourly => 0.7,
            Self::Daily => 0.85,
        }
    }

    /// Whether generations prefer the curated source domains.
    pub fn uses_allowed_domains(&self) -> bool {
        matches!(self, Self::Daily)
    }
}

/// Lifecycle state of a run. `Pending` until the single finalization write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Success,
    Fail,
}

string_enum!(RunStatus, "run status", { Pending => "pending", Success => "success", Fail => "fail" });

impl RunStatus {
    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Reasoning-effort tier passed to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

string_enum!(ReasoningEffort, "reasoning effort", { Low => "low", Medium => "medium", High => "high" });

/// Output verbosity tier recorded on the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

string_enum!(Verbosity, "verbosity", { Low => "low", Medium => "medium", High => "high" });

/// Asset classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Coin,
    Stable,
    Wrapped,
}

string_enum!(AssetCategory, "asset category", { Coin => "coin", Stable => "stable", Wrapped => "wrapped" });

// ---------------------------------------------------------------------------
// Languages
// ---------------------------------------------------------------------------

/// A language summaries can be produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Language {
    /// ISO 639-1 code, used as the summary language tag.
    pub code: &'static str,
    /// English display name, used in translation prompts.
    pub name: &'static str,
}

/// Language every generation is produced in.
pub const BASE_LANGUAGE: Language = Language {
    code: "en",
    name: "English",
};

/// Every language the read surface accepts, base language first.
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    BASE_LANGUAGE,
    Language {
        code: "ja",
        name: "Japanese",
    },
    Language {
        code: "ko",
        name: "Korean",
    },
    Language {
        code: "zh",
        name: "Chinese",
    },
    Language {
        code: "es",
        name: "Spanish",
    },
];

impl Language {
    /// Look up a supported language by code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Language> {
        SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
            .copied()
    }

    /// Whether this is the base language.
    pub fn is_base(&self) -> bool {
        self.code == BASE_LANGUAGE.code
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A statically seeded tradable symbol. Read-only during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Unique identifier (UUID v7).
    pub id: String,
    /// Ticker symbol, upper case (e.g. `WLD`).
    pub symbol: String,
    /// Display name.
    pub name: String,
    pub category: AssetCategory,
    /// Networks the asset is deployed on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chains: Vec<String>,
    /// Official links keyed by kind (`website`, `docs`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub official_urls: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One execution of the hourly or daily ingestion job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub kind: RunKind,
    pub status: RunStatus,
    /// Model identifier the run was configured with.
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
    pub started_at: DateTime<Utc>,
    /// Set by the finalization write.
    pub finished_at: Option<DateTime<Utc>>,
    pub token_in: u64,
    pub token_out: u64,
    pub cost_usd: f64,
    /// Semicolon-joined per-unit failures, or the top-level failure message.
    pub error: Option<String>,
}

impl Run {
    /// A fresh `pending` run starting now.
    pub fn pending(
        kind: RunKind,
        model: impl Into<String>,
        reasoning_effort: ReasoningEffort,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            id: RunId::new(),
            kind,
            status: RunStatus::Pending,
            model: model.into(),
            reasoning_effort,
            verbosity,
            started_at: Utc::now(),
            finished_at: None,
            token_in: 0,
            token_out: 0,
            cost_usd: 0.0,
            error: None,
        }
    }
}

/// Values written by the single finalization of a run.
#[derive(Debug, Clone)]
pub struct RunCompletion {
    /// `Success` or `Fail`.
    pub status: RunStatus,
    pub finished_at: DateTime<Utc>,
    pub token_in: u64,
    pub token_out: u64,
    pub cost_usd: f64,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// One URL cited by a generated summary for an asset within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub run_id: String,
    pub asset_id: String,
    /// Normalized URL (scheme, host and path only).
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Hostname, `None` when the URL could not be parsed.
    pub domain: Option<String>,
    /// SHA-256 of the normalized URL.
    pub hash: String,
    /// Relevance in `[0, 1]`.
    pub relevance_score: f64,
    pub fetched_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// One generated narrative for one asset, in one language, within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub run_id: String,
    pub asset_id: String,
    /// Language code (see [`SUPPORTED_LANGUAGES`]).
    pub language: String,
    pub overview_md: String,
    pub market_1d_md: String,
    pub market_30d_md: String,
    pub outlook_md: String,
    pub confidence: f64,
    /// Ids of the [`Source`] rows this summary cites, in citation order.
    pub citations: Vec<String>,
    pub created_at: DateTime<Utc>,
}
