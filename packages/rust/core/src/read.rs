//! Read projections over persisted assets, summaries and runs.
//!
//! Each function returns a serializable view or a [`MarketBriefError`] whose
//! [`status_code`](MarketBriefError::status_code) is the HTTP class a read
//! surface should answer with.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketbrief_shared::{
    AssetCategory, BASE_LANGUAGE, Language, MarketBriefError, ReasoningEffort, Result, RunId,
    RunKind, RunStatus, Verbosity, is_valid_asset_symbol,
};
use marketbrief_storage::Storage;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetView {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
    pub chains: Vec<String>,
    pub official_urls: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    /// Creation time of the newest summary in any language.
    pub last_update: Option<DateTime<Utc>>,
}

/// Every asset with the time of its latest summary.
pub async fn list_assets(storage: &Storage) -> Result<Vec<AssetView>> {
    let mut views = Vec::new();
    for asset in storage.list_assets().await? {
        let last_update = storage.latest_summary_at(&asset.id).await?;
        views.push(AssetView {
            id: asset.id,
            symbol: asset.symbol,
            name: asset.name,
            category: asset.category,
            chains: asset.chains,
            official_urls: asset.official_urls,
            created_at: asset.created_at,
            last_update,
        });
    }
    Ok(views)
}

// ---------------------------------------------------------------------------
// Latest summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub category: AssetCategory,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    pub id: String,
    pub kind: RunKind,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub token_in: u64,
    pub token_out: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub asset: AssetRef,
    pub language: String,
    pub overview_md: String,
    pub market_1d_md: String,
    pub market_30d_md: String,
    pub outlook_md: String,
    pub confidence: f64,
    pub citations: Vec<String>,
    pub sources: Vec<SourceView>,
    pub run_meta: Option<RunMeta>,
    pub created_at: DateTime<Utc>,
}

/// Latest summary for `symbol` in `language` (base language when `None`).
pub async fn asset_summary(
    storage: &Storage,
    symbol: &str,
    language: Option<&str>,
) -> Result<SummaryView> {
    if !is_valid_asset_symbol(symbol) {
        return Err(MarketBriefError::validation("Invalid asset symbol"));
    }
    let language = match language {
        Some(code) => Language::from_code(code).ok_or_else(|| {
            MarketBriefError::validation(format!("Unsupported language '{code}'"))
        })?,
        None => BASE_LANGUAGE,
    };

    let asset = storage
        .get_asset_by_symbol(symbol)
        .await?
        .ok_or_else(|| MarketBriefError::not_found("Asset not found"))?;

    let summary = storage
        .latest_summary(&asset.id, language.code)
        .await?
        .ok_or_else(|| MarketBriefError::not_found("No summary available for this asset"))?;

    let sources = storage
        .sources_by_ids(&summary.citations)
        .await?
        .into_iter()
        .map(|s| SourceView {
            id: s.id,
            url: s.url,
            title: s.title,
            domain: s.domain,
            relevance_score: s.relevance_score,
        })
        .collect();

    let run_meta = match summary.run_id.parse::<RunId>() {
        Ok(run_id) => storage.get_run(&run_id).await?.map(|run| RunMeta {
            id: run.id.to_string(),
            kind: run.kind,
            model: run.model,
            started_at: run.started_at,
            finished_at: run.finished_at,
            token_in: run.token_in,
            token_out: run.token_out,
            cost_usd: run.cost_usd,
        }),
        Err(_) => None,
    };

    Ok(SummaryView {
        asset: AssetRef {
            id: asset.id,
            symbol: asset.symbol,
            name: asset.name,
            category: asset.category,
        },
        language: summary.language,
        overview_md: summary.overview_md,
        market_1d_md: summary.market_1d_md,
        market_30d_md: summary.market_30d_md,
        outlook_md: summary.outlook_md,
        confidence: summary.confidence,
        citations: summary.citations,
        sources,
        run_meta,
        created_at: summary.created_at,
    })
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaryItem {
    pub id: String,
    pub asset_id: String,
    pub language: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummaries {
    pub count: usize,
    pub items: Vec<RunSummaryItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSources {
    pub count: usize,
    pub unique_domains: usize,
    pub domains: Vec<String>,
    /// Mean relevance, 0 when the run has no sources.
    pub avg_relevance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub id: String,
    pub kind: RunKind,
    pub status: RunStatus,
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub token_in: u64,
    pub token_out: u64,
    pub cost_usd: f64,
    pub error: Option<String>,
    pub summaries: RunSummaries,
    pub sources: RunSources,
}

/// A run with its summaries and source statistics.
pub async fn run_details(storage: &Storage, id: &str) -> Result<RunView> {
    let run_id: RunId = id
        .parse()
        .map_err(|_| MarketBriefError::validation(format!("Invalid run id '{id}'")))?;

    let run = storage
        .get_run(&run_id)
        .await?
        .ok_or_else(|| MarketBriefError::not_found("Run not found"))?;

    let items: Vec<RunSummaryItem> = storage
        .list_summaries_by_run(&run_id)
        .await?
        .into_iter()
        .map(|s| RunSummaryItem {
            id: s.id,
            asset_id: s.asset_id,
            language: s.language,
            confidence: s.confidence,
            created_at: s.created_at,
        })
        .collect();

    let sources = storage.list_sources_by_run(&run_id).await?;
    let domains: BTreeSet<String> = sources.iter().filter_map(|s| s.domain.clone()).collect();
    let avg_relevance = if sources.is_empty() {
        0.0
    } else {
        sources.iter().map(|s| s.relevance_score).sum::<f64>() / sources.len() as f64
    };

    Ok(RunView {
        id: run.id.to_string(),
        kind: run.kind,
        status: run.status,
        model: run.model,
        reasoning_effort: run.reasoning_effort,
        verbosity: run.verbosity,
        started_at: run.started_at,
        finished_at: run.finished_at,
        token_in: run.token_in,
        token_out: run.token_out,
        cost_usd: run.cost_usd,
        error: run.error,
        summaries: RunSummaries {
            count: items.len(),
            items,
        },
        sources: RunSources {
            count: sources.len(),
            unique_domains: domains.len(),
            domains: domains.into_iter().collect(),
            avg_relevance,
        },
    })
}

/// Most recent runs, newest first.
pub async fn recent_runs(storage: &Storage, limit: u32) -> Result<Vec<RunView>> {
    let mut views = Vec::new();
    for run in storage.list_runs(limit).await? {
        views.push(run_details(storage, &run.id.to_string()).await?);
    }
    Ok(views)
}
