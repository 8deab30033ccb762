pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Timeout in seconds for text completion upstream calls.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
            http_use_env_proxy: false,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn text_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// How synthetic streaming splits a buffered completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamGranularity {
    /// One delta per space-separated word.
    #[default]
    Word,
    /// The whole text in a single delta.
    Whole,
}

impl fmt::Display for StreamGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamGranularity::Word => write!(f, "word"),
            StreamGranularity::Whole => write!(f, "whole"),
        }
    }
}

/// Synthetic streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_token_delay_ms")]
    pub token_delay_ms: u64,
    #[serde(default)]
    pub granularity: StreamGranularity,
}

fn default_token_delay_ms() -> u64 {
    10
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            token_delay_ms: default_token_delay_ms(),
            granularity: StreamGranularity::default(),
        }
    }
}

impl StreamingConfig {
    #[must_use]
    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.token_delay_ms)
    }
}

/// Attempts, backoff base and per-attempt timeout for one image operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

/// Retry settings for the image operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_edit_retry")]
    pub edit: RetrySettings,
    #[serde(default = "default_remove_background_retry")]
    pub remove_background: RetrySettings,
    #[serde(default = "default_style_conversion_retry")]
    pub style_conversion: RetrySettings,
}

fn default_edit_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1_000,
        timeout_secs: 120,
    }
}
fn default_remove_background_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 3,
        base_delay_ms: 1_000,
        timeout_secs: 60,
    }
}
fn default_style_conversion_retry() -> RetrySettings {
    RetrySettings {
        max_attempts: 2,
        base_delay_ms: 2_000,
        timeout_secs: 180,
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            edit: default_edit_retry(),
            remove_background: default_remove_background_retry(),
            style_conversion: default_style_conversion_retry(),
        }
    }
}

/// Base URLs of the upstream hosts. Overridable so tests can point at local mocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_sii3")]
    pub sii3: String,
    #[serde(default = "default_sonnet")]
    pub sonnet: String,
    #[serde(default = "default_chatdeep")]
    pub chatdeep: String,
    #[serde(default = "default_llmchat")]
    pub llmchat: String,
    #[serde(default = "default_vetrex")]
    pub vetrex: String,
}

fn default_sii3() -> String {
    "https://sii3.top".to_string()
}
fn default_sonnet() -> String {
    "https://sonnet3-5.free.nf".to_string()
}
fn default_chatdeep() -> String {
    "https://chat-deep.ai".to_string()
}
fn default_llmchat() -> String {
    "https://llmchat.in".to_string()
}
fn default_vetrex() -> String {
    "https://vetrex.x10.mx".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sii3: default_sii3(),
            sonnet: default_sonnet(),
            chatdeep: default_chatdeep(),
            llmchat: default_llmchat(),
            vetrex: default_vetrex(),
        }
    }
}

impl ProvidersConfig {
    /// Every host pointed at the same base URL.
    #[must_use]
    pub fn all_at(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            sii3: base.clone(),
            sonnet: base.clone(),
            chatdeep: base.clone(),
            llmchat: base.clone(),
            vetrex: base,
        }
    }
}

/// What to do when a request names a model alias the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownModelPolicy {
    #[default]
    Fallback,
    Reject,
}

/// Model resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub unknown_model: UnknownModelPolicy,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
}

fn default_fallback_model() -> String {
    "gemma-27b".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            unknown_model: UnknownModelPolicy::default(),
            fallback_model: default_fallback_model(),
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_yaml::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}
