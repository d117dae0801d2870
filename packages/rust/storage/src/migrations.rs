//! SQL migration definitions for the MarketBrief database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its own version in `schema_migrations` as its final statement.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: assets, runs, sources, summaries",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Statically seeded assets
CREATE TABLE IF NOT EXISTS assets (
    id            TEXT PRIMARY KEY,
    symbol        TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    category      TEXT NOT NULL,
    chains_json   TEXT NOT NULL DEFAULT '[]',
    official_json TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL
);

-- One row per ingestion execution
CREATE TABLE IF NOT EXISTS runs (
    id               TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,
    status           TEXT NOT NULL,
    model            TEXT NOT NULL,
    reasoning_effort TEXT NOT NULL,
    verbosity        TEXT NOT NULL,
    started_at       TEXT NOT NULL,
    finished_at      TEXT,
    token_in         INTEGER NOT NULL DEFAULT 0,
    token_out        INTEGER NOT NULL DEFAULT 0,
    cost_usd         REAL NOT NULL DEFAULT 0,
    error            TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs(started_at);

-- URLs cited by a run's summaries
CREATE TABLE IF NOT EXISTS sources (
    id              TEXT PRIMARY KEY,
    run_id          TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    asset_id        TEXT NOT NULL REFERENCES assets(id),
    url             TEXT NOT NULL,
    title           TEXT,
    domain          TEXT,
    hash            TEXT NOT NULL,
    relevance_score REAL NOT NULL,
    fetched_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_run_id ON sources(run_id);
CREATE INDEX IF NOT EXISTS idx_sources_hash ON sources(hash);

-- Generated narratives, one per (run, asset, language)
CREATE TABLE IF NOT EXISTS summaries (
    id             TEXT PRIMARY KEY,
    run_id         TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    asset_id       TEXT NOT NULL REFERENCES assets(id),
    language       TEXT NOT NULL,
    overview_md    TEXT NOT NULL,
    market_1d_md   TEXT NOT NULL,
    market_30d_md  TEXT NOT NULL,
    outlook_md     TEXT NOT NULL,
    confidence     REAL NOT NULL,
    citations_json TEXT NOT NULL DEFAULT '[]',
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_summaries_run_id ON summaries(run_id);
CREATE INDEX IF NOT EXISTS idx_summaries_asset_lang ON summaries(asset_id, language, created_at);

INSERT OR IGNORE INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
