//! Logging setup for qsub-server
//!
//! Console output always; with a log directory, an additional daily rotated
//! file, optionally in JSON for log aggregation.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "qsub-server.log";

/// Keeps the file writer flushing until the process exits
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Build the filter: `RUST_LOG` wins over the configured level or directives
pub fn build_filter(log_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(log_level).with_context(|| format!("Invalid log filter '{}'", log_level))
}

/// Initialise the global subscriber. `log` records from the library are
/// forwarded through the subscriber's log bridge.
pub fn init_logging(log_dir: Option<&Path>, log_level: &str, json: bool) -> Result<()> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);
    let registry = tracing_subscriber::registry()
        .with(build_filter(log_level)?)
        .with(console_layer);

    let Some(log_dir) = log_dir else {
        registry
            .try_init()
            .context("Failed to initialize logging")?;
        return Ok(());
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }
    let _ = FILE_GUARD.set(guard);

    tracing::info!(
        "File logging enabled in {} (daily rotation{})",
        log_dir.display(),
        if json { ", JSON" } else { "" }
    );
    Ok(())
}
