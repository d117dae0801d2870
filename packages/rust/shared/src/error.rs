//! Error types for MarketBrief.
//!
//! Library crates use [`MarketBriefError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Top-level error type for all MarketBrief operations.
#[derive(Debug, thiserror::Error)]
pub enum MarketBriefError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// The generation provider answered with a non-success status.
    #[error("provider error: HTTP {status} - {body}")]
    Provider { status: u16, body: String },

    /// The provider answered 2xx but no recognized content field was present.
    #[error("provider contract violation: {0}")]
    ProviderContract(String),

    /// A provider call exceeded its hard wall-clock limit.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Malformed stored or received data.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid caller input (unknown symbol, unsupported language, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A requested record does not exist.
    #[error("{message}")]
    NotFound { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MarketBriefError>;

impl MarketBriefError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
            message: msg.into(),
        }
    }

    /// Create a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status class a read surface should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            _ => 500,
        }
    }

    /// Structured JSON body for this error.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

/// JSON error projection: `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
