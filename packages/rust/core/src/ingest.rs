//! Ingestion run controller: sweep → create run → fan out → finalize.
//!
//! One call to [`run_ingest`] is one run. Units (one asset's generation, or
//! one asset-language translation) are isolated: a failed unit becomes a
//! labeled error string and never aborts its siblings. Only failures outside
//! the units, such as loading the asset set, fail the call itself, and even
//! then the run record is finalized as `fail` first.

use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use marketbrief_markdown::{SectionKeywords, extract_source_urls};
use marketbrief_provider::{GenerateRequest, SummaryGenerator, TokenUsage, TranslateRequest};
use marketbrief_shared::{
    AppConfig, Asset, BASE_LANGUAGE, FanOut, Language, MarketBriefError, ReasoningEffort, Result,
    Run, RunCompletion, RunId, RunKind, RunStatus, SECTION_PLACEHOLDER, Source, Summary, Verbosity,
    allowed_domains,
};
use marketbrief_sources::{DomainTiers, collect_sources};
use marketbrief_storage::Storage;

use crate::cost::format_cost;
use crate::retry::{RetryPolicy, retry_with_backoff};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Model and quality settings fixed for every run of a kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTier {
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub verbosity: Verbosity,
    /// Confidence stamped on every summary the run produces.
    pub confidence: f64,
}

impl RunTier {
    pub fn for_kind(kind: RunKind, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reasoning_effort: kind.reasoning_effort(),
            verbosity: kind.verbosity(),
            confidence: kind.confidence(),
        }
    }
}

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub kind: RunKind,
    pub tier: RunTier,
    pub fan_out: FanOut,
    /// Translation targets. Never contains the base language.
    pub languages: Vec<Language>,
    pub retry: RetryPolicy,
    /// Runs started longer ago than this are swept before the new run starts.
    pub retention: chrono::Duration,
}

impl IngestConfig {
    /// Resolve the run configuration for `kind` from the app config.
    pub fn for_kind(kind: RunKind, config: &AppConfig) -> Result<Self> {
        let mut languages: Vec<Language> = Vec::new();
        for code in &config.defaults.languages {
            let language = Language::from_code(code).ok_or_else(|| {
                MarketBriefError::config(format!("unsupported language '{code}'"))
            })?;
            if !language.is_base() && !languages.contains(&language) {
                languages.push(language);
            }
        }

        Ok(Self {
            kind,
            tier: RunTier::for_kind(kind, config.openai.model.clone()),
            fan_out: config.defaults.fan_out,
            languages,
            retry: RetryPolicy::from(&config.retry),
            retention: chrono::Duration::days(i64::from(config.defaults.retention_days)),
        })
    }
}

// ---------------------------------------------------------------------------
// Progress and report
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait IngestProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a unit settles. `label` is `SYMBOL` or `SYMBOL/lang`.
    fn unit_finished(&self, label: &str, ok: bool);
    /// Called once the run has been finalized.
    fn done(&self, report: &IngestReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl IngestProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn unit_finished(&self, _label: &str, _ok: bool) {}
    fn done(&self, _report: &IngestReport) {}
}

/// Outcome of a run that reached finalization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// `true` iff no unit failed.
    pub success: bool,
    pub run_id: RunId,
    /// Summary rows created, all languages.
    pub summaries: usize,
    /// Source rows created.
    pub sources: usize,
    pub token_in: u64,
    pub token_out: u64,
    pub cost_usd: f64,
    /// Labeled unit failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Commutative accumulator folded over unit outcomes.
#[derive(Debug, Default)]
struct RunTotals {
    summaries: usize,
    sources: usize,
    usage: TokenUsage,
    errors: Vec<String>,
}

impl RunTotals {
    fn merge(&mut self, other: RunTotals) {
        self.summaries += other.summaries;
        self.sources += other.sources;
        self.usage += other.usage;
        self.errors.extend(other.errors);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Execute one ingestion run.
///
/// 1. Sweep runs older than the retention horizon
/// 2. Create the `pending` run
/// 3. Fan out over every asset (and language, in parallel mode)
/// 4. Finalize the run with tokens, cost and joined unit errors
///
/// Returns `Err` only for failures outside the units. The run is then
/// finalized `fail` with the error's message before returning.
#[instrument(skip_all, fields(kind = %config.kind, fan_out = config.fan_out.as_str()))]
pub async fn run_ingest<G: SummaryGenerator>(
    config: &IngestConfig,
    generator: &G,
    storage: &Storage,
    progress: &dyn IngestProgress,
) -> Result<IngestReport> {
    let start = Instant::now();

    progress.phase("Sweeping expired runs");
    let cutoff = Utc::now() - config.retention;
    let swept = storage.delete_runs_started_before(&cutoff).await?;
    if swept > 0 {
        info!(swept, %cutoff, "removed expired runs");
    }

    let run = Run::pending(
        config.kind,
        config.tier.model.clone(),
        config.tier.reasoning_effort,
        config.tier.verbosity,
    );
    storage.insert_run(&run).await?;
    info!(run_id = %run.id, model = %run.model, "run started");

    let totals = match process_assets(config, generator, storage, &run.id, progress).await {
        Ok(totals) => totals,
        Err(e) => {
            warn!(run_id = %run.id, error = %e, "run failed before completing its units");
            let completion = RunCompletion {
                status: RunStatus::Fail,
                finished_at: Utc::now(),
                token_in: 0,
                token_out: 0,
                cost_usd: 0.0,
                error: Some(e.to_string()),
            };
            if let Err(finalize_err) = storage.finalize_run(&run.id, &completion).await {
                warn!(run_id = %run.id, error = %finalize_err, "could not finalize failed run");
            }
            return Err(e);
        }
    };

    progress.phase("Finalizing run");
    let cost_usd = format_cost(
        totals.usage.input_tokens,
        totals.usage.output_tokens,
        &run.model,
    );
    let success = totals.errors.is_empty();
    let completion = RunCompletion {
        status: if success {
            RunStatus::Success
        } else {
            RunStatus::Fail
        },
        finished_at: Utc::now(),
        token_in: totals.usage.input_tokens,
        token_out: totals.usage.output_tokens,
        cost_usd,
        error: (!success).then(|| totals.errors.join("; ")),
    };
    if !storage.finalize_run(&run.id, &completion).await? {
        warn!(run_id = %run.id, "run was already finalized");
    }

    let report = IngestReport {
        success,
        run_id: run.id,
        summaries: totals.summaries,
        sources: totals.sources,
        token_in: totals.usage.input_tokens,
        token_out: totals.usage.output_tokens,
        cost_usd,
        errors: totals.errors,
    };

    progress.done(&report);

    info!(
        run_id = %report.run_id,
        success = report.success,
        summaries = report.summaries,
        sources = report.sources,
        token_in = report.token_in,
        token_out = report.token_out,
        cost_usd = report.cost_usd,
        failed_units = report.errors.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "run complete"
    );

    Ok(report)
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Shared, read-only state for every unit of one run.
struct UnitContext<'a, G> {
    config: &'a IngestConfig,
    generator: &'a G,
    storage: &'a Storage,
    run_id: &'a RunId,
    progress: &'a dyn IngestProgress,
    keywords: SectionKeywords,
    tiers: DomainTiers,
}

async fn process_assets<G: SummaryGenerator>(
    config: &IngestConfig,
    generator: &G,
    storage: &Storage,
    run_id: &RunId,
    progress: &dyn IngestProgress,
) -> Result<RunTotals> {
    progress.phase("Loading assets");
    let assets = storage.list_assets().await?;
    if assets.is_empty() {
        return Err(MarketBriefError::not_found("no assets seeded"));
    }

    let ctx = UnitContext {
        config,
        generator,
        storage,
        run_id,
        progress,
        keywords: SectionKeywords::default(),
        tiers: DomainTiers::default(),
    };

    progress.phase("Generating summaries");
    let mut totals = RunTotals::default();
    match config.fan_out {
        FanOut::Parallel => {
            let outcomes = join_all(
                assets
                    .iter()
                    .map(|asset| ingest_asset(&ctx, asset, &config.languages)),
            )
            .await;
            for outcome in outcomes {
                totals.merge(outcome);
            }
        }
        FanOut::Sequential => {
            for asset in &assets {
                totals.merge(ingest_asset(&ctx, asset, &[]).await);
            }
        }
    }

    Ok(totals)
}

/// The base-language summary a unit produced, kept for its translations.
struct BaseSummary {
    content: String,
    citations: Vec<String>,
}

/// Generate, persist and translate one asset. Never fails: problems become
/// labeled entries in the returned totals.
async fn ingest_asset<G: SummaryGenerator>(
    ctx: &UnitContext<'_, G>,
    asset: &Asset,
    languages: &[Language],
) -> RunTotals {
    let mut totals = RunTotals::default();

    let base = match generate_and_persist(ctx, asset, &mut totals).await {
        Ok(base) => {
            ctx.progress.unit_finished(&asset.symbol, true);
            base
        }
        Err(e) => {
            warn!(symbol = %asset.symbol, error = %e, "asset unit failed");
            ctx.progress.unit_finished(&asset.symbol, false);
            totals.errors.push(format!("{}: {e}", asset.symbol));
            return totals;
        }
    };

    let outcomes = join_all(
        languages
            .iter()
            .map(|language| translate_and_persist(ctx, asset, &base, language)),
    )
    .await;

    for (language, (usage, outcome)) in languages.iter().zip(outcomes) {
        let label = format!("{}/{}", asset.symbol, language.code);
        totals.usage += usage;
        match outcome {
            Ok(()) => {
                ctx.progress.unit_finished(&label, true);
                totals.summaries += 1;
            }
            Err(e) => {
                warn!(%label, error = %e, "translation unit failed");
                ctx.progress.unit_finished(&label, false);
                totals.errors.push(format!("{label}: {e}"));
            }
        }
    }

    totals
}

/// Base-language unit: generate with retry, extract, persist sources then
/// the summary citing them.
async fn generate_and_persist<G: SummaryGenerator>(
    ctx: &UnitContext<'_, G>,
    asset: &Asset,
    totals: &mut RunTotals,
) -> Result<BaseSummary> {
    let request = GenerateRequest {
        symbol: asset.symbol.clone(),
        name: asset.name.clone(),
        kind: ctx.config.kind,
        allowed_domains: if ctx.config.kind.uses_allowed_domains() {
            allowed_domains(&asset.symbol)
        } else {
            Vec::new()
        },
    };

    let generation = retry_with_backoff(ctx.config.retry, &asset.symbol, || {
        ctx.generator.generate_summary(&request)
    })
    .await?;
    // Tokens are spent once the provider answers, whether or not the rows land.
    totals.usage += generation.usage;

    let urls = extract_source_urls(&generation.content);
    let scored = collect_sources(&urls, &ctx.tiers);
    debug!(
        symbol = %asset.symbol,
        urls = urls.len(),
        distinct = scored.len(),
        model = %generation.model,
        "extracted sources"
    );

    let mut citations = Vec::with_capacity(scored.len());
    for source in scored {
        let row = Source {
            id: Uuid::now_v7().to_string(),
            run_id: ctx.run_id.to_string(),
            asset_id: asset.id.clone(),
            url: source.normalized_url,
            title: None,
            domain: source.domain,
            hash: source.hash,
            relevance_score: source.relevance_score,
            fetched_at: Utc::now(),
        };
        ctx.storage.insert_source(&row).await?;
        citations.push(row.id);
    }

    let summary = build_summary(ctx, asset, &BASE_LANGUAGE, &generation.content, citations.clone());
    ctx.storage.insert_summary(&summary).await?;
    // Sources only count once the summary citing them is stored.
    totals.sources += citations.len();
    totals.summaries += 1;

    Ok(BaseSummary {
        content: generation.content,
        citations,
    })
}

/// Translation unit: translate with retry and persist a summary sharing the
/// base summary's citations. Usage is reported even when persisting fails.
async fn translate_and_persist<G: SummaryGenerator>(
    ctx: &UnitContext<'_, G>,
    asset: &Asset,
    base: &BaseSummary,
    language: &Language,
) -> (TokenUsage, Result<()>) {
    let request = TranslateRequest {
        content: base.content.clone(),
        language: *language,
    };
    let label = format!("{}/{}", asset.symbol, language.code);

    let translation = match retry_with_backoff(ctx.config.retry, &label, || {
        ctx.generator.translate_summary(&request)
    })
    .await
    {
        Ok(translation) => translation,
        Err(e) => return (TokenUsage::default(), Err(e)),
    };

    let summary = build_summary(ctx, asset, language, &translation.content, base.citations.clone());
    (translation.usage, ctx.storage.insert_summary(&summary).await)
}

fn build_summary<G>(
    ctx: &UnitContext<'_, G>,
    asset: &Asset,
    language: &Language,
    content: &str,
    citations: Vec<String>,
) -> Summary {
    let sections = ctx.keywords.parse(content).with_placeholder(SECTION_PLACEHOLDER);
    Summary {
        id: Uuid::now_v7().to_string(),
        run_id: ctx.run_id.to_string(),
        asset_id: asset.id.clone(),
        language: language.code.to_string(),
        overview_md: sections.overview,
        market_1d_md: sections.last_24h,
        market_30d_md: sections.last_30d,
        outlook_md: sections.outlook,
        confidence: ctx.config.tier.confidence,
        citations,
        created_at: Utc::now(),
    }
}
