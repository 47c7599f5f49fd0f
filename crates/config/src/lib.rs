//! Configuration loading and validation for Fableforge.
//!
//! Loads configuration from `~/.fableforge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.fableforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Story store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-owner generation limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("generation", &self.generation)
            .field("retrieval", &self.retrieval)
            .field("store", &self.store)
            .field("limits", &self.limits)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Episodes generated per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Regeneration rounds before a batch commits with a warning.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Preceding episodes summarized into the recap.
    #[serde(default = "default_recap_window")]
    pub recap_window: u32,
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_batch_size() -> u32 {
    2
}
fn default_max_attempts() -> u32 {
    3
}
fn default_recap_window() -> u32 {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            recap_window: default_recap_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Chunks returned per retrieval query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Importance bonus for chunks from anchor episodes.
    #[serde(default = "default_anchor_bonus")]
    pub anchor_bonus: f32,

    /// Percentile of adjacent-sentence distance used as the chunk
    /// breakpoint threshold.
    #[serde(default = "default_breakpoint_percentile")]
    pub breakpoint_percentile: f32,

    /// Whether anchor-episode chunks are always merged into results.
    #[serde(default = "default_true")]
    pub pin_anchors: bool,
}

fn default_embedding_model() -> String {
    "embedding-001".into()
}
fn default_top_k() -> usize {
    5
}
fn default_anchor_bonus() -> f32 {
    2.0
}
fn default_breakpoint_percentile() -> f32 {
    95.0
}
fn default_true() -> bool {
    true
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            embedding_model: default_embedding_model(),
            top_k: default_top_k(),
            anchor_bonus: default_anchor_bonus(),
            breakpoint_percentile: default_breakpoint_percentile(),
            pin_anchors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database path for the sqlite backend. Defaults under the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Episodes per owner per day. 0 disables the gate.
    #[serde(default = "default_daily_limit")]
    pub daily_episodes: u32,

    /// Episodes per owner per calendar month. 0 disables the gate.
    #[serde(default = "default_monthly_limit")]
    pub monthly_episodes: u32,
}

fn default_daily_limit() -> u32 {
    10
}
fn default_monthly_limit() -> u32 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_episodes: default_daily_limit(),
            monthly_episodes: default_monthly_limit(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.fableforge/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `FABLEFORGE_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("FABLEFORGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("FABLEFORGE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("FABLEFORGE_MODEL") {
            config.generation.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".fableforge")
    }

    /// Database path for the sqlite backend.
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(p) => PathBuf::from(p),
            None => Self::config_dir().join("fableforge.db"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.generation.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "generation.batch_size must be at least 1".into(),
            ));
        }
        if self.generation.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_attempts must be at least 1".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }
        if self.retrieval.breakpoint_percentile <= 0.0
            || self.retrieval.breakpoint_percentile >= 100.0
        {
            return Err(ConfigError::ValidationError(
                "retrieval.breakpoint_percentile must be in (0, 100)".into(),
            ));
        }
        if self.store.backend != "sqlite" && self.store.backend != "memory" {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be \"sqlite\" or \"memory\", got \"{}\"",
                self.store.backend
            )));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// API key for a named provider, falling back to the top-level key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for `init` output).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
