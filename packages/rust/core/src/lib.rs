//! Ingestion pipeline and read projections for MarketBrief.
//!
//! This crate ties together the generation client, content extraction, source
//! scoring and storage into end-to-end workflows (e.g., [`run_ingest`]).

pub mod cost;
pub mod ingest;
pub mod read;
pub mod retry;

pub use cost::{DEFAULT_PRICING_MODEL, ModelPricing, format_cost, pricing_for};
pub use ingest::{
    IngestConfig, IngestProgress, IngestReport, RunTier, SilentProgress, run_ingest,
};
pub use retry::{RetryPolicy, retry_with_backoff};
