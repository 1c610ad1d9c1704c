//! Engine configuration.
//!
//! Every field has a serde default, so a partial JSON document (or none at
//! all) yields a usable configuration. Environment variables prefixed with
//! `STAGEPILOT_` override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a [`PipelineDriver`](crate::runtime::PipelineDriver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Artifact polling.
    #[serde(default)]
    pub poll: PollConfig,
    /// Start a generation job as soon as its stage becomes current.
    #[serde(default = "default_true")]
    pub auto_start_jobs: bool,
    /// Write completion data to the stage-data store.
    #[serde(default = "default_true")]
    pub persist: bool,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP job trigger.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            auto_start_jobs: true,
            persist: true,
            logging: LoggingConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid configuration JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid engine configuration")
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in config file {}", path.display()))
    }

    /// Applies `STAGEPILOT_*` overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable does not parse.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup("STAGEPILOT_POLL_INTERVAL_MS") {
            self.poll.interval_ms = raw
                .parse()
                .with_context(|| format!("STAGEPILOT_POLL_INTERVAL_MS={raw}"))?;
        }
        if let Some(raw) = lookup("STAGEPILOT_POLL_MAX_ATTEMPTS") {
            self.poll.max_attempts = Some(
                raw.parse()
                    .with_context(|| format!("STAGEPILOT_POLL_MAX_ATTEMPTS={raw}"))?,
            );
        }
        if let Some(url) = lookup("STAGEPILOT_WEBHOOK_URL") {
            self.webhook.base_url = Some(url);
        }
        if let Some(level) = lookup("STAGEPILOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(self)
    }

    /// Sets the poll configuration.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Enables or disables automatic job starts.
    #[must_use]
    pub fn with_auto_start_jobs(mut self, enabled: bool) -> Self {
        self.auto_start_jobs = enabled;
        self
    }

    /// Enables or disables persistence.
    #[must_use]
    pub fn with_persist(mut self, enabled: bool) -> Self {
        self.persist = enabled;
        self
    }
}

/// Artifact polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between lookups in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Give up after this many lookups. `None` polls until cancelled.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_interval_ms() -> u64 {
    4000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: None,
        }
    }
}

impl PollConfig {
    /// Sets the interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// The interval as a `Duration`; never zero.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `stagepilot=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// HTTP job trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Base URL jobs are posted under.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: f64,
}

fn default_webhook_timeout() -> f64 {
    10.0
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

impl WebhookConfig {
    /// Gets the timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }
}
