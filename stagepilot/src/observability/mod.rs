//! Log subscriber setup and span helpers.

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber for `config`.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns an error if the level does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Span wrapping one background polling job.
#[must_use]
pub fn job_span(subject_id: &str, stage: &str, artifact_key: &str) -> Span {
    tracing::info_span!("artifact_poll", subject_id, stage, artifact_key)
}
