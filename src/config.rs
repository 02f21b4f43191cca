//! Configuration module for feedhub.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::feed::Filter;
use crate::{FeedhubError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used for links in generated feeds (may be empty).
    #[serde(default)]
    pub base_url: String,
    /// Upper bound for handling a single request, in seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout_secs: u64,
    /// Requests per second allowed per client IP on the read routes.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_sec: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_response_timeout() -> u64 {
    30
}

fn default_rate_limit() -> u32 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: String::new(),
            response_timeout_secs: default_response_timeout(),
            rate_limit_per_sec: default_rate_limit(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedhub.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedhub.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Templates configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TemplatesConfig {
    /// Directory with template overrides. Empty means built-in templates only.
    #[serde(default)]
    pub path: String,
}

/// Processing loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    /// Sleep between two update cycles, in seconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,
    /// Maximum candidates taken from a single source per cycle.
    #[serde(default = "default_max_per_feed")]
    pub max_per_feed: usize,
    /// Maximum items returned on the read path.
    #[serde(default = "default_max_total")]
    pub max_total: usize,
    /// Retention bound: items kept per feed after trimming.
    #[serde(default = "default_max_keep")]
    pub max_keep: usize,
    /// Maximum number of sources processed at the same time.
    #[serde(default = "default_concurrent")]
    pub concurrent: usize,
}

fn default_update_interval() -> u64 {
    600 // 10 minutes
}

fn default_max_per_feed() -> usize {
    5
}

fn default_max_total() -> usize {
    100
}

fn default_max_keep() -> usize {
    5000
}

fn default_concurrent() -> usize {
    8
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            max_per_feed: default_max_per_feed(),
            max_total: default_max_total(),
            max_keep: default_max_keep(),
            concurrent: default_concurrent(),
        }
    }
}

/// Source fetching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
        }
    }
}

/// Render cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Lifetime of a cached render, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Upper bound for the total size of cached payloads.
    #[serde(default = "default_cache_max_size")]
    pub max_size_bytes: usize,
}

fn default_cache_ttl() -> u64 {
    180 // 3 minutes
}

fn default_cache_max_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_size_bytes: default_cache_max_size(),
        }
    }
}

/// Telegram delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot token. Empty disables delivery.
    #[serde(default, skip_serializing)]
    pub token: String,
    /// Bot API base URL.
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// HTTP client timeout in seconds (0 means the default of 60).
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u64 {
    60
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_telegram_api_url(),
            timeout_secs: default_telegram_timeout(),
        }
    }
}

/// Date suffix appended to item titles at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum DateSuffix {
    /// Titles are rendered as stored.
    #[default]
    #[serde(rename = "")]
    None,
    /// `Title (2024-03-21)`.
    #[serde(rename = "yyyymmdd")]
    SuffixYmd,
    /// `Title (2024-21-03)`.
    #[serde(rename = "yyyyddmm")]
    SuffixDmy,
}

impl DateSuffix {
    /// chrono format string for the suffix, if any.
    pub fn format(&self) -> Option<&'static str> {
        match self {
            DateSuffix::None => None,
            DateSuffix::SuffixYmd => Some("%Y-%m-%d"),
            DateSuffix::SuffixDmy => Some("%Y-%d-%m"),
        }
    }
}

/// A single upstream source of a feed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Source {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// RSS/Atom URL.
    pub url: String,
}

/// Configuration of one published feed.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FeedConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub language: String,
    /// Destination channel for notifications. Empty disables them.
    #[serde(default)]
    pub telegram_channel: String,
    /// Junk filter. The default filter never matches.
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub ext_date: DateSuffix,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub owner_email: String,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Templates configuration.
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Processing loop configuration.
    #[serde(default)]
    pub system: SystemConfig,
    /// Source fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Render cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Telegram configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Published feeds keyed by name.
    #[serde(default)]
    pub feeds: BTreeMap<String, FeedConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedhubError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedhubError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDHUB_TELEGRAM_TOKEN`: Override the bot token
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("FEEDHUB_TELEGRAM_TOKEN") {
            if !token.is_empty() {
                self.telegram.token = token;
            }
        }
    }

    /// Build a configuration for a single feed without a config file.
    pub fn single_feed(feed_url: &str, channel: &str, update_interval_secs: u64) -> Self {
        let feed = FeedConfig {
            telegram_channel: channel.to_string(),
            sources: vec![Source {
                name: "auto".to_string(),
                url: feed_url.to_string(),
            }],
            ..FeedConfig::default()
        };

        let mut config = Config::default();
        config.feeds.insert("auto".to_string(), feed);
        config.system.update_interval_secs = update_interval_secs;
        config
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - `system.concurrent` or `system.max_per_feed` is zero
    /// - a feed has no sources
    /// - a source URL is not an absolute http(s) URL
    ///
    /// Filters whose pattern does not compile are only logged: such a
    /// filter treats every title as a non-match before `invert` applies.
    pub fn validate(&self) -> Result<()> {
        if self.system.concurrent == 0 {
            return Err(FeedhubError::Validation(
                "system.concurrent must be at least 1".to_string(),
            ));
        }
        if self.system.max_per_feed == 0 {
            return Err(FeedhubError::Validation(
                "system.max_per_feed must be at least 1".to_string(),
            ));
        }

        for (name, feed) in &self.feeds {
            if feed.sources.is_empty() {
                return Err(FeedhubError::Validation(format!(
                    "feed {name} has no sources"
                )));
            }
            for source in &feed.sources {
                let parsed = url::Url::parse(&source.url).map_err(|e| {
                    FeedhubError::Validation(format!(
                        "feed {name}: invalid source URL {}: {e}",
                        source.url
                    ))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(FeedhubError::Validation(format!(
                        "feed {name}: unsupported URL scheme in {}",
                        source.url
                    )));
                }
            }
            if let Err(e) = feed.filter.check() {
                warn!(feed = %name, "filter pattern does not compile: {}", e);
            }
        }

        Ok(())
    }
}
