//! Configuration management for the stream relay.
//!
//! Configuration is read from a YAML file with support for environment
//! variable expansion, then selected environment variables override the
//! file values. Every field has a default, so an empty file is valid.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;

/// Default endpoint for concise-mode streaming.
pub const DEFAULT_PERPLEXITY_URL: &str = "https://api.perplexity.ai/chat/completions";

/// Largest single SSE line accepted by the frame decoder (32 MiB).
pub const DEFAULT_MAX_LINE_BYTES: usize = 32 * 1024 * 1024;

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?\$\{([^}:]+)(?::?-?([^}]*))?\}["']?"#).expect("valid env var pattern")
});

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream provider settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Decode pipeline settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Endpoint used for concise-mode streaming
    #[serde(default = "default_perplexity_url")]
    pub perplexity_url: String,

    /// Models accepted by the concise endpoint
    #[serde(default = "default_supported_models")]
    pub supported_models: Vec<String>,

    /// Whether to verify SSL certificates for upstream requests
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Total request timeout in seconds, body included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            perplexity_url: default_perplexity_url(),
            supported_models: default_supported_models(),
            verify_ssl: default_verify_ssl(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Decode pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Maximum length of a single SSE line in bytes
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Disable ANSI colors (file logging)
    #[serde(default)]
    pub no_color: bool,

    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            no_color: false,
            json: false,
        }
    }
}

fn default_perplexity_url() -> String {
    DEFAULT_PERPLEXITY_URL.to_string()
}

fn default_supported_models() -> Vec<String> {
    vec!["sonar".to_string(), "sonar-deep-research".to_string()]
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

fn default_log_filter() -> String {
    "info,llm_stream_relay=debug".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_stream_relay::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("relay.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        // Load .env file if it exists (skip in tests to avoid interference)
        #[cfg(not(test))]
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(&expanded, config::FileFormat::Yaml))
            .build()
            .and_then(|raw| raw.try_deserialize())
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Build a configuration from defaults and environment variables only.
    pub fn from_env() -> Self {
        #[cfg(not(test))]
        dotenvy::dotenv().ok();

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config
    }

    /// Override with environment variables (env vars take precedence).
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PERPLEXITY_URL") {
            self.upstream.perplexity_url = url;
        }

        if let Ok(verify_ssl_str) = std::env::var("VERIFY_SSL") {
            self.upstream.verify_ssl = str_to_bool(&verify_ssl_str);
        }

        if let Ok(timeout_str) = std::env::var("REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                self.upstream.request_timeout_secs = timeout;
            }
        }

        if let Ok(limit_str) = std::env::var("MAX_LINE_BYTES") {
            if let Ok(limit) = limit_str.parse::<usize>() {
                self.stream.max_line_bytes = limit;
            }
        }

        if let Ok(filter) = std::env::var("RUST_LOG") {
            self.logging.filter = filter;
        }

        if std::env::var("NO_COLOR").is_ok() {
            self.logging.no_color = true;
        }

        if let Ok(json_str) = std::env::var("LOG_JSON") {
            self.logging.json = str_to_bool(&json_str);
        }
    }
}

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");

            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
