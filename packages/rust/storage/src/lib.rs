//! libSQL storage layer (embedded, local file).
//!
//! The [`Storage`] struct wraps a libSQL database holding assets, runs, cited
//! sources and generated summaries.
//!
//! **Access rules:**
//! - Ingestion: read-write via [`Storage::open`]
//! - Read commands: read-only via [`Storage::open_readonly`]
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision,
//! so lexical comparison in SQL matches chronological order.

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use marketbrief_shared::{
    Asset, MarketBriefError, Result, Run, RunCompletion, RunId, RunStatus, Source, Summary,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarketBriefError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MarketBriefError::not_found(format!(
                "database not found at {}",
                path.display()
            )));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        conn.execute("PRAGMA foreign_keys = ON", params![])
            .await
            .map_err(db_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    MarketBriefError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(MarketBriefError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assets
    // -----------------------------------------------------------------------

    /// Insert an asset unless its symbol already exists. Returns whether a row was added.
    pub async fn upsert_asset(&self, asset: &Asset) -> Result<bool> {
        self.check_writable()?;
        let chains = to_json(&asset.chains)?;
        let official = to_json(&asset.official_urls)?;
        let affected = self
            .conn
            .execute(
                "INSERT INTO assets (id, symbol, name, category, chains_json, official_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(symbol) DO NOTHING",
                params![
                    asset.id.as_str(),
                    asset.symbol.as_str(),
                    asset.name.as_str(),
                    asset.category.as_str(),
                    chains,
                    official,
                    fmt_ts(&asset.created_at)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Insert every asset not already present. Returns how many were added.
    pub async fn seed_assets(&self, assets: &[Asset]) -> Result<usize> {
        let mut added = 0;
        for asset in assets {
            if self.upsert_asset(asset).await? {
                added += 1;
            } else {
                debug!(symbol = %asset.symbol, "asset already seeded");
            }
        }
        Ok(added)
    }

    /// All assets ordered by symbol.
    pub async fn list_assets(&self) -> Result<Vec<Asset>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, symbol, name, category, chains_json, official_json, created_at
                 FROM assets ORDER BY symbol",
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut assets = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            assets.push(row_to_asset(&row)?);
        }
        Ok(assets)
    }

    /// Look up an asset by symbol (case-insensitive).
    pub async fn get_asset_by_symbol(&self, symbol: &str) -> Result<Option<Asset>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, symbol, name, category, chains_json, official_json, created_at
                 FROM assets WHERE symbol = ?1",
                params![symbol.to_uppercase()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_asset(&row)?)),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Insert a new run record.
    pub async fn insert_run(&self, run: &Run) -> Result<()> {
        self.check_writable()?;
        let finished_at = run.finished_at.as_ref().map(fmt_ts);
        self.conn
            .execute(
                "INSERT INTO runs (id, kind, status, model, reasoning_effort, verbosity,
                                   started_at, finished_at, token_in, token_out, cost_usd, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    run.id.to_string(),
                    run.kind.as_str(),
                    run.status.as_str(),
                    run.model.as_str(),
                    run.reasoning_effort.as_str(),
                    run.verbosity.as_str(),
                    fmt_ts(&run.started_at),
                    finished_at,
                    to_i64(run.token_in),
                    to_i64(run.token_out),
                    run.cost_usd,
                    run.error.clone()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Write the terminal state of a pending run.
    ///
    /// Only a `pending` run is updated; returns `false` when the run was
    /// already finalized or does not exist.
    pub async fn finalize_run(&self, id: &RunId, completion: &RunCompletion) -> Result<bool> {
        self.check_writable()?;
        if !completion.status.is_terminal() {
            return Err(MarketBriefError::validation(
                "a run can only be finalized as success or fail",
            ));
        }

        let affected = self
            .conn
            .execute(
                "UPDATE runs
                 SET status = ?2, finished_at = ?3, token_in = ?4, token_out = ?5,
                     cost_usd = ?6, error = ?7
                 WHERE id = ?1 AND status = ?8",
                params![
                    id.to_string(),
                    completion.status.as_str(),
                    fmt_ts(&completion.finished_at),
                    to_i64(completion.token_in),
                    to_i64(completion.token_out),
                    completion.cost_usd,
                    completion.error.clone(),
                    RunStatus::Pending.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    /// Get a run by id.
    pub async fn get_run(&self, id: &RunId) -> Result<Option<Run>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, status, model, reasoning_effort, verbosity,
                        started_at, finished_at, token_in, token_out, cost_usd, error
                 FROM runs WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_run(&row)?)),
            None => Ok(None),
        }
    }

    /// Most recent runs first, at most `limit`.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<Run>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, kind, status, model, reasoning_effort, verbosity,
                        started_at, finished_at, token_in, token_out, cost_usd, error
                 FROM runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(db_err)?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            runs.push(row_to_run(&row)?);
        }
        Ok(runs)
    }

    /// Delete every run that started before `cutoff`, with its sources and
    /// summaries. Pending runs are included. Returns the number of runs removed.
    pub async fn delete_runs_started_before(&self, cutoff: &DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let cutoff = fmt_ts(cutoff);

        for table in ["summaries", "sources"] {
            self.conn
                .execute(
                    &format!(
                        "DELETE FROM {table}
                         WHERE run_id IN (SELECT id FROM runs WHERE started_at < ?1)"
                    ),
                    params![cutoff.as_str()],
                )
                .await
                .map_err(db_err)?;
        }

        let removed = self
            .conn
            .execute(
                "DELETE FROM runs WHERE started_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Sources
    // -----------------------------------------------------------------------

    /// Insert a cited source.
    pub async fn insert_source(&self, source: &Source) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO sources (id, run_id, asset_id, url, title, domain, hash,
                                      relevance_score, fetched_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    source.id.as_str(),
                    source.run_id.as_str(),
                    source.asset_id.as_str(),
                    source.url.as_str(),
                    source.title.clone(),
                    source.domain.clone(),
                    source.hash.as_str(),
                    source.relevance_score,
                    fmt_ts(&source.fetched_at)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Every source recorded by a run, in insertion order.
    pub async fn list_sources_by_run(&self, run_id: &RunId) -> Result<Vec<Source>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, asset_id, url, title, domain, hash, relevance_score, fetched_at
                 FROM sources WHERE run_id = ?1 ORDER BY rowid",
                params![run_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut sources = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            sources.push(row_to_source(&row)?);
        }
        Ok(sources)
    }

    /// Sources with the given ids, in the order of `ids`. Unknown ids are skipped.
    pub async fn sources_by_ids(&self, ids: &[String]) -> Result<Vec<Source>> {
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            let mut rows = self
                .conn
                .query(
                    "SELECT id, run_id, asset_id, url, title, domain, hash, relevance_score, fetched_at
                     FROM sources WHERE id = ?1",
                    params![id.as_str()],
                )
                .await
                .map_err(db_err)?;

            if let Some(row) = rows.next().await.map_err(db_err)? {
                sources.push(row_to_source(&row)?);
            }
        }
        Ok(sources)
    }

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    /// Insert a generated summary.
    pub async fn insert_summary(&self, summary: &Summary) -> Result<()> {
        self.check_writable()?;
        let citations = to_json(&summary.citations)?;
        self.conn
            .execute(
                "INSERT INTO summaries (id, run_id, asset_id, language, overview_md, market_1d_md,
                                        market_30d_md, outlook_md, confidence, citations_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    summary.id.as_str(),
                    summary.run_id.as_str(),
                    summary.asset_id.as_str(),
                    summary.language.as_str(),
                    summary.overview_md.as_str(),
                    summary.market_1d_md.as_str(),
                    summary.market_30d_md.as_str(),
                    summary.outlook_md.as_str(),
                    summary.confidence,
                    citations,
                    fmt_ts(&summary.created_at)
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Most recent summary for an asset in a language.
    pub async fn latest_summary(&self, asset_id: &str, language: &str) -> Result<Option<Summary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, asset_id, language, overview_md, market_1d_md, market_30d_md,
                        outlook_md, confidence, citations_json, created_at
                 FROM summaries WHERE asset_id = ?1 AND language = ?2
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![asset_id, language],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_summary(&row)?)),
            None => Ok(None),
        }
    }

    /// Creation time of the newest summary for an asset, in any language.
    pub async fn latest_summary_at(&self, asset_id: &str) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT MAX(created_at) FROM summaries WHERE asset_id = ?1",
                params![asset_id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => match row.get::<String>(0).ok() {
                Some(s) => Ok(Some(parse_ts(&s)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Every summary produced by a run, in insertion order.
    pub async fn list_summaries_by_run(&self, run_id: &RunId) -> Result<Vec<Summary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, run_id, asset_id, language, overview_md, market_1d_md, market_30d_md,
                        outlook_md, confidence, citations_json, created_at
                 FROM summaries WHERE run_id = ?1 ORDER BY rowid",
                params![run_id.to_string()],
            )
            .await
            .map_err(db_err)?;

        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            summaries.push(row_to_summary(&row)?);
        }
        Ok(summaries)
    }
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn db_err(e: libsql::Error) -> MarketBriefError {
    MarketBriefError::Storage(e.to_string())
}

fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MarketBriefError::Storage(format!("invalid date '{s}': {e}")))
}

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| MarketBriefError::Storage(e.to_string()))
}

fn text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

fn real(row: &libsql::Row, idx: i32) -> Result<f64> {
    row.get::<f64>(idx).map_err(db_err)
}

fn count(row: &libsql::Row, idx: i32) -> Result<u64> {
    Ok(row.get::<i64>(idx).map_err(db_err)?.max(0) as u64)
}

fn row_to_asset(row: &libsql::Row) -> Result<Asset> {
    let chains: String = text(row, 4)?;
    let official: String = text(row, 5)?;
    Ok(Asset {
        id: text(row, 0)?,
        symbol: text(row, 1)?,
        name: text(row, 2)?,
        category: text(row, 3)?.parse()?,
        chains: serde_json::from_str(&chains)
            .map_err(|e| MarketBriefError::parse(format!("asset chains: {e}")))?,
        official_urls: serde_json::from_str::<BTreeMap<String, String>>(&official)
            .map_err(|e| MarketBriefError::parse(format!("asset official urls: {e}")))?,
        created_at: parse_ts(&text(row, 6)?)?,
    })
}

fn row_to_run(row: &libsql::Row) -> Result<Run> {
    let id: String = text(row, 0)?;
    Ok(Run {
        id: id
            .parse()
            .map_err(|e| MarketBriefError::parse(format!("run id '{id}': {e}")))?,
        kind: text(row, 1)?.parse()?,
        status: text(row, 2)?.parse()?,
        model: text(row, 3)?,
        reasoning_effort: text(row, 4)?.parse()?,
        verbosity: text(row, 5)?.parse()?,
        started_at: parse_ts(&text(row, 6)?)?,
        finished_at: match row.get::<String>(7).ok() {
            Some(s) => Some(parse_ts(&s)?),
            None => None,
        },
        token_in: count(row, 8)?,
        token_out: count(row, 9)?,
        cost_usd: real(row, 10)?,
        error: row.get::<String>(11).ok(),
    })
}

fn row_to_source(row: &libsql::Row) -> Result<Source> {
    Ok(Source {
        id: text(row, 0)?,
        run_id: text(row, 1)?,
        asset_id: text(row, 2)?,
        url: text(row, 3)?,
        title: row.get::<String>(4).ok(),
        domain: row.get::<String>(5).ok(),
        hash: text(row, 6)?,
        relevance_score: real(row, 7)?,
        fetched_at: parse_ts(&text(row, 8)?)?,
    })
}

fn row_to_summary(row: &libsql::Row) -> Result<Summary> {
    let citations: String = text(row, 9)?;
    Ok(Summary {
        id: text(row, 0)?,
        run_id: text(row, 1)?,
        asset_id: text(row, 2)?,
        language: text(row, 3)?,
        overview_md: text(row, 4)?,
        market_1d_md: text(row, 5)?,
        market_30d_md: text(row, 6)?,
        outlook_md: text(row, 7)?,
        confidence: real(row, 8)?,
        citations: serde_json::from_str(&citations)
            .map_err(|e| MarketBriefError::parse(format!("summary citations: {e}")))?,
        created_at: parse_ts(&text(row, 10)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marketbrief_shared::{ASSET_SEEDS, ReasoningEffort, RunKind, Verbosity};
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    async fn seeded_storage() -> (Storage, Asset) {
        let storage = test_storage().await;
        let assets: Vec<Asset> = ASSET_SEEDS.iter().map(|s| s.to_asset()).collect();
        storage.seed_assets(&assets).await.unwrap();
        let wld = storage.get_asset_by_symbol("WLD").await.unwrap().unwrap();
        (storage, wld)
    }

    fn hourly_run() -> Run {
        Run::pending(RunKind::Hourly, "o4-mini", ReasoningEffort::Low, Verbosity::Low)
    }

    fn source_for(run: &Run, asset: &Asset, url: &str) -> Source {
        Source {
            id: Uuid::now_v7().to_string(),
            run_id: run.id.to_string(),
            asset_id: asset.id.clone(),
            url: url.into(),
            title: None,
            domain: Some("worldcoin.org".into()),
            hash: format!("hash-{url}"),
            relevance_score: 1.0,
            fetched_at: Utc::now(),
        }
    }

    fn summary_for(run: &Run, asset: &Asset, language: &str, citations: Vec<String>) -> Summary {
        Summary {
            id: Uuid::now_v7().to_string(),
            run_id: run.id.to_string(),
            asset_id: asset.id.clone(),
            language: language.into(),
            overview_md: "overview".into(),
            market_1d_md: "N/A".into(),
            market_30d_md: "30d".into(),
            outlook_md: "outlook".into(),
            confidence: 0.7,
            citations,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let storage = test_storage().await;
        let assets: Vec<Asset> = ASSET_SEEDS.iter().map(|s| s.to_asset()).collect();
        assert_eq!(storage.seed_assets(&assets).await.unwrap(), ASSET_SEEDS.len());

        let again: Vec<Asset> = ASSET_SEEDS.iter().map(|s| s.to_asset()).collect();
        assert_eq!(storage.seed_assets(&again).await.unwrap(), 0);

        let listed = storage.list_assets().await.unwrap();
        assert_eq!(listed.len(), ASSET_SEEDS.len());
        let symbols: Vec<&str> = listed.iter().map(|a| a.symbol.as_str()).collect();
        assert_eq!(symbols, ["USDC", "WBTC", "WETH", "WLD"]);
    }

    #[tokio::test]
    async fn asset_lookup_roundtrips_json_columns() {
        let (storage, wld) = seeded_storage().await;
        let found = storage.get_asset_by_symbol("wld").await.unwrap().unwrap();
        assert_eq!(found.id, wld.id);
        assert_eq!(found.name, "Worldcoin");
        assert!(!found.chains.is_empty());
        assert!(found.official_urls.contains_key("website"));
        assert!(storage.get_asset_by_symbol("DOGE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn run_finalizes_exactly_once() {
        let storage = test_storage().await;
        let run = hourly_run();
        storage.insert_run(&run).await.unwrap();

        let stored = storage.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Pending);
        assert!(stored.finished_at.is_none());
        assert!(stored.error.is_none());

        let completion = RunCompletion {
            status: RunStatus::Fail,
            finished_at: Utc::now(),
            token_in: 1500,
            token_out: 700,
            cost_usd: 0.036,
            error: Some("WLD: boom".into()),
        };
        assert!(storage.finalize_run(&run.id, &completion).await.unwrap());

        let second = RunCompletion {
            status: RunStatus::Success,
            error: None,
            ..completion
        };
        assert!(!storage.finalize_run(&run.id, &second).await.unwrap());

        let stored = storage.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Fail);
        assert_eq!(stored.token_in, 1500);
        assert_eq!(stored.token_out, 700);
        assert_eq!(stored.error.as_deref(), Some("WLD: boom"));
        assert!(stored.finished_at.is_some());
    }

    #[tokio::test]
    async fn list_runs_newest_first() {
        let storage = test_storage().await;
        let mut older = hourly_run();
        older.started_at = Utc::now() - Duration::minutes(5);
        let newer = hourly_run();
        storage.insert_run(&older).await.unwrap();
        storage.insert_run(&newer).await.unwrap();

        let runs = storage.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert_eq!(storage.list_runs(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finalize_rejects_pending_status() {
        let storage = test_storage().await;
        let run = hourly_run();
        storage.insert_run(&run).await.unwrap();
        let completion = RunCompletion {
            status: RunStatus::Pending,
            finished_at: Utc::now(),
            token_in: 0,
            token_out: 0,
            cost_usd: 0.0,
            error: None,
        };
        assert!(storage.finalize_run(&run.id, &completion).await.is_err());
    }

    #[tokio::test]
    async fn sources_and_summaries_by_run() {
        let (storage, wld) = seeded_storage().await;
        let run = hourly_run();
        storage.insert_run(&run).await.unwrap();

        let a = source_for(&run, &wld, "https://worldcoin.org/a");
        let b = source_for(&run, &wld, "https://worldcoin.org/b");
        storage.insert_source(&a).await.unwrap();
        storage.insert_source(&b).await.unwrap();

        let citations = vec![b.id.clone(), a.id.clone()];
        storage
            .insert_summary(&summary_for(&run, &wld, "en", citations.clone()))
            .await
            .unwrap();

        let sources = storage.list_sources_by_run(&run.id).await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://worldcoin.org/a");

        let cited = storage.sources_by_ids(&citations).await.unwrap();
        assert_eq!(cited[0].id, b.id);
        assert_eq!(cited[1].id, a.id);

        let summaries = storage.list_summaries_by_run(&run.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].citations, citations);
    }

    #[tokio::test]
    async fn latest_summary_per_language() {
        let (storage, wld) = seeded_storage().await;
        let older = hourly_run();
        let newer = hourly_run();
        storage.insert_run(&older).await.unwrap();
        storage.insert_run(&newer).await.unwrap();

        let mut first = summary_for(&older, &wld, "en", vec![]);
        first.created_at = Utc::now() - Duration::hours(1);
        first.overview_md = "old".into();
        storage.insert_summary(&first).await.unwrap();
        let mut second = summary_for(&newer, &wld, "en", vec![]);
        second.overview_md = "new".into();
        storage.insert_summary(&second).await.unwrap();
        storage
            .insert_summary(&summary_for(&newer, &wld, "ja", vec![]))
            .await
            .unwrap();

        let latest = storage.latest_summary(&wld.id, "en").await.unwrap().unwrap();
        assert_eq!(latest.overview_md, "new");
        assert!(storage.latest_summary(&wld.id, "ko").await.unwrap().is_none());

        let at = storage.latest_summary_at(&wld.id).await.unwrap();
        assert!(at.is_some());
        let usdc = storage.get_asset_by_symbol("USDC").await.unwrap().unwrap();
        assert!(storage.latest_summary_at(&usdc.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retention_deletes_old_runs_with_children() {
        let (storage, wld) = seeded_storage().await;

        let mut old = hourly_run();
        old.started_at = Utc::now() - Duration::days(40);
        storage.insert_run(&old).await.unwrap();
        let old_source = source_for(&old, &wld, "https://worldcoin.org/old");
        storage.insert_source(&old_source).await.unwrap();
        storage
            .insert_summary(&summary_for(&old, &wld, "en", vec![old_source.id.clone()]))
            .await
            .unwrap();

        let fresh = hourly_run();
        storage.insert_run(&fresh).await.unwrap();
        storage
            .insert_source(&source_for(&fresh, &wld, "https://worldcoin.org/new"))
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        assert_eq!(storage.delete_runs_started_before(&cutoff).await.unwrap(), 1);

        assert!(storage.get_run(&old.id).await.unwrap().is_none());
        assert!(storage.list_sources_by_run(&old.id).await.unwrap().is_empty());
        assert!(storage.list_summaries_by_run(&old.id).await.unwrap().is_empty());
        assert!(storage.get_run(&fresh.id).await.unwrap().is_some());
        assert_eq!(storage.list_sources_by_run(&fresh.id).await.unwrap().len(), 1);

        assert_eq!(storage.delete_runs_started_before(&cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_run(&hourly_run()).await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro.insert_run(&hourly_run()).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("mb_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
