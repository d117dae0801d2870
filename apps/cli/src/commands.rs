//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use marketbrief_core::{IngestConfig, IngestProgress, IngestReport, read, run_ingest};
use marketbrief_provider::GenerationClient;
use marketbrief_shared::{
    ASSET_SEEDS, AppConfig, AssetSeed, FanOut, MarketBriefError, ProviderConfig, RunKind,
    expand_home, init_config, load_config,
};
use marketbrief_storage::Storage;
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// MarketBrief: sourced, multilingual crypto market summaries.
#[derive(Parser)]
#[command(
    name = "marketbrief",
    version,
    about = "Generate, store and read multilingual crypto market summaries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Database file (defaults to `defaults.database_path` from the config).
    #[arg(long, global = true, env = "MARKETBRIEF_DB")]
    pub db: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one ingestion pass over every seeded asset.
    Ingest {
        /// Run kind: hourly or daily.
        kind: RunKind,

        /// Override the configured fan-out: parallel or sequential.
        #[arg(long)]
        fan_out: Option<FanOut>,
    },

    /// Insert the built-in asset catalog. Existing symbols are left alone.
    Seed,

    /// List assets with the time of their latest summary.
    Assets,

    /// Show the latest summary for an asset.
    Summary {
        /// Asset symbol, e.g. WLD.
        symbol: String,

        /// Language code (defaults to English).
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Show one run with its summaries and source statistics.
    Run {
        /// Run ID.
        id: String,
    },

    /// List recent runs, newest first.
    Runs {
        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "marketbrief=info",
        1 => "marketbrief=debug",
        _ => "marketbrief=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays machine-readable JSON.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let db = cli.db.as_deref();
    match cli.command {
        Command::Ingest { kind, fan_out } => cmd_ingest(db, kind, fan_out).await,
        Command::Seed => cmd_seed(db).await,
        Command::Assets => cmd_assets(db).await,
        Command::Summary { symbol, lang } => cmd_summary(db, &symbol, lang.as_deref()).await,
        Command::Run { id } => cmd_run(db, &id).await,
        Command::Runs { limit } => cmd_runs(db, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(db: Option<&Path>, kind: RunKind, fan_out: Option<FanOut>) -> Result<()> {
    let config = load_config()?;
    let provider = ProviderConfig::from_app_config(&config)?;

    let mut ingest = IngestConfig::for_kind(kind, &config)?;
    if let Some(fan_out) = fan_out {
        ingest.fan_out = fan_out;
    }

    let client = GenerationClient::new(&provider)?;
    let storage = Storage::open(&database_path(db, &config)?).await?;

    info!(
        %kind,
        model = client.model(),
        fan_out = ingest.fan_out.as_str(),
        languages = ingest.languages.len(),
        "starting ingestion"
    );

    let progress = CliProgress::new();
    let report = match run_ingest(&ingest, &client, &storage, &progress).await {
        Ok(report) => report,
        Err(e) => {
            progress.spinner.finish_and_clear();
            println!("{}", error_json(&e)?);
            return Err(e.into());
        }
    };

    if !report.success {
        warn!(
            run_id = %report.run_id,
            failures = report.errors.len(),
            "run finished with unit failures"
        );
    }
    print_json(&report)
}

async fn cmd_seed(db: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&database_path(db, &config)?).await?;

    let assets: Vec<_> = ASSET_SEEDS.iter().map(AssetSeed::to_asset).collect();
    let inserted = storage.seed_assets(&assets).await?;

    info!(inserted, total = assets.len(), "seeded asset catalog");
    println!("Seeded {inserted} new asset(s) ({} in catalog)", assets.len());
    Ok(())
}

async fn cmd_assets(db: Option<&Path>) -> Result<()> {
    let storage = open_for_read(db).await?;
    emit(read::list_assets(&storage).await)
}

async fn cmd_summary(db: Option<&Path>, symbol: &str, lang: Option<&str>) -> Result<()> {
    let storage = open_for_read(db).await?;
    emit(read::asset_summary(&storage, symbol, lang).await)
}

async fn cmd_run(db: Option<&Path>, id: &str) -> Result<()> {
    let storage = open_for_read(db).await?;
    emit(read::run_details(&storage, id).await)
}

async fn cmd_runs(db: Option<&Path>, limit: u32) -> Result<()> {
    let storage = open_for_read(db).await?;
    emit(read::recent_runs(&storage, limit).await)
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn database_path(db: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(expand_home(&config.defaults.database_path)?),
    }
}

async fn open_for_read(db: Option<&Path>) -> Result<Storage> {
    let config = load_config()?;
    let path = database_path(db, &config)?;
    match Storage::open_readonly(&path).await {
        Ok(storage) => Ok(storage),
        Err(e) => {
            println!("{}", error_json(&e)?);
            Err(e.into())
        }
    }
}

/// The `{ "error": ... }` body printed to stdout when a command fails.
fn error_json(error: &MarketBriefError) -> Result<String> {
    Ok(serde_json::to_string_pretty(&error.to_body())?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a read projection, or its `{ "error": ... }` body on failure.
fn emit<T: Serialize>(result: std::result::Result<T, MarketBriefError>) -> Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            println!("{}", error_json(&e)?);
            Err(eyre!("{e} (status {})", e.status_code()))
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    settled: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            settled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }
}

impl IngestProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn unit_finished(&self, label: &str, ok: bool) {
        let settled = self.settled.fetch_add(1, Ordering::Relaxed) + 1;
        let failed = if ok {
            self.failed.load(Ordering::Relaxed)
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed) + 1
        };
        self.spinner.set_message(format!(
            "Settled {settled} unit(s), {failed} failed · {label}"
        ));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}
