//! Configuration file parser for `~/.config/feedcrawl/config.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as likely typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{FetchOptions, RedirectMode, MAX_FEED_SIZE};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration
// ============================================================================

const KNOWN_KEYS: [&str; 8] = [
    "database_path",
    "fetch_timeout_secs",
    "probe_timeout_secs",
    "max_feed_bytes",
    "max_redirects",
    "probe_concurrency",
    "crawl_concurrency",
    "user_agent",
];

/// Crawler configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `None` means `feedcrawl.db` in the config directory.
    pub database_path: Option<String>,

    /// Whole-request timeout for feed fetches, per redirect hop.
    pub fetch_timeout_secs: u64,

    /// Timeout for a single link probe.
    pub probe_timeout_secs: u64,

    /// Feed bodies larger than this are rejected.
    pub max_feed_bytes: usize,

    pub max_redirects: usize,

    /// Link probes in flight per crawl.
    pub probe_concurrency: usize,

    /// Feed sources crawled at once by `crawl` without `--id`.
    pub crawl_concurrency: usize,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            fetch_timeout_secs: 30,
            probe_timeout_secs: 10,
            max_feed_bytes: MAX_FEED_SIZE,
            max_redirects: 5,
            probe_concurrency: 8,
            crawl_concurrency: 4,
            user_agent: format!("feedcrawl/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero timeouts or concurrency → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("fetch_timeout_secs", self.fetch_timeout_secs as usize),
            ("probe_timeout_secs", self.probe_timeout_secs as usize),
            ("max_feed_bytes", self.max_feed_bytes),
            ("probe_concurrency", self.probe_concurrency),
            ("crawl_concurrency", self.crawl_concurrency),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Transport options for feed fetches. Only http/https switches of the
    /// feed URL are followed; any other redirect stops the fetch at that hop.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_bytes: self.max_feed_bytes,
            max_redirects: self.max_redirects,
            redirects: RedirectMode::ProtocolSwitchOnly,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
