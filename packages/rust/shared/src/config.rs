//! Application configuration for MarketBrief.
//!
//! User config lives at `~/.marketbrief/marketbrief.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MarketBriefError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "marketbrief.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".marketbrief";

// ---------------------------------------------------------------------------
// Config structs (matching marketbrief.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenAI provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Retry policy for external calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// How a run distributes its per-asset work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    /// All assets concurrently, then every target language per asset concurrently.
    #[default]
    Parallel,
    /// Legacy mode: one asset at a time, base language only.
    Sequential,
}

impl FanOut {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

impl std::str::FromStr for FanOut {
    type Err = MarketBriefError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parallel" => Ok(Self::Parallel),
            "sequential" => Ok(Self::Sequential),
            other => Err(MarketBriefError::parse(format!(
                "unknown fan-out '{other}': expected 'parallel' or 'sequential'"
            ))),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the libSQL database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Fan-out shape for ingestion runs.
    #[serde(default)]
    pub fan_out: FanOut,

    /// Target language codes summaries are translated into.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Runs started longer ago than this are swept before each new run.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            fan_out: FanOut::default(),
            languages: default_languages(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_database_path() -> String {
    "~/.marketbrief/marketbrief.db".into()
}
fn default_languages() -> Vec<String> {
    vec!["ja".into(), "ko".into(), "zh".into(), "es".into()]
}
fn default_retention_days() -> u32 {
    7
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API root, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for generation and translation.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_translation_timeout")]
    pub translation_timeout_secs: u64,

    /// Adds the no-recommendations rule to the generation prompt.
    #[serde(default)]
    pub strict_prompt: bool,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            generation_timeout_secs: default_generation_timeout(),
            translation_timeout_secs: default_translation_timeout(),
            strict_prompt: false,
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "o4-mini".into()
}
fn default_generation_timeout() -> u64 {
    180
}
fn default_translation_timeout() -> u64 {
    120
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles for each further attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Provider config (runtime, resolved once at startup)
// ---------------------------------------------------------------------------

/// Resolved provider settings handed to the generation client.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub generation_timeout: Duration,
    pub translation_timeout: Duration,
    pub strict_prompt: bool,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("generation_timeout", &self.generation_timeout)
            .field("translation_timeout", &self.translation_timeout)
            .field("strict_prompt", &self.strict_prompt)
            .finish()
    }
}

impl ProviderConfig {
    /// Build from the `[openai]` section and an explicit API key.
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            translation_timeout: Duration::from_secs(config.translation_timeout_secs),
            strict_prompt: config.strict_prompt,
        }
    }

    /// Read the API key from the configured env var and build the provider config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        validate_api_key(config)?;
        let key = std::env::var(&config.openai.api_key_env).unwrap_or_default();
        Ok(Self::new(&config.openai, key))
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.marketbrief/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MarketBriefError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.marketbrief/marketbrief.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MarketBriefError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MarketBriefError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MarketBriefError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MarketBriefError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MarketBriefError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| MarketBriefError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Check that the OpenAI API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(MarketBriefError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("database_path"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("fan_out = \"parallel\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.retention_days, 7);
        assert_eq!(parsed.openai.model, "o4-mini");
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.defaults.languages, ["ja", "ko", "zh", "es"]);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
fan_out = "sequential"
languages = []

[openai]
model = "gpt-4o"
strict_prompt = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.fan_out, FanOut::Sequential);
        assert!(config.defaults.languages.is_empty());
        assert_eq!(config.openai.model, "gpt-4o");
        assert!(config.openai.strict_prompt);
        assert_eq!(config.openai.generation_timeout_secs, 180);
        assert_eq!(config.retry.base_delay_ms, 1000);
    }

    #[test]
    fn provider_config_from_section() {
        let mut section = OpenAiConfig::default();
        section.base_url = "http://localhost:9999/v1/".into();
        let provider = ProviderConfig::new(&section, "sk-test");
        assert_eq!(provider.base_url, "http://localhost:9999/v1");
        assert_eq!(provider.generation_timeout, Duration::from_secs(180));
        assert_eq!(provider.translation_timeout, Duration::from_secs(120));
        assert!(!format!("{provider:?}").contains("sk-test"));
    }

    #[test]
    fn fan_out_parses_its_names() {
        assert_eq!("parallel".parse::<FanOut>().unwrap(), FanOut::Parallel);
        assert_eq!("sequential".parse::<FanOut>().unwrap(), FanOut::Sequential);
        assert!("batched".parse::<FanOut>().is_err());
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/x.db").unwrap(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openai.api_key_env = "MB_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
