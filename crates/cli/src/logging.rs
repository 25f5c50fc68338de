//! Logging setup (tracing-subscriber, optional non-blocking file layer)

use anyhow::{Context, Result};
use bluesec_core::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber
///
/// `RUST_LOG` wins over the configured level; `BLUESEC_LOG_FORMAT` wins over
/// the configured format. Keep the returned guard alive until exit so the
/// file writer flushes.
pub fn init(config: &LoggingConfig, debug: bool) -> Result<Option<WorkerGuard>> {
    let level = if debug { "debug" } else { config.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("bluesec={level}")))
        .context("Failed to create env filter")?;

    let format = std::env::var("BLUESEC_LOG_FORMAT").unwrap_or_else(|_| config.format.clone());
    let (json, pretty) = match format.as_str() {
        // Production: JSON structured logging
        "json" => (Some(fmt::layer().json().with_writer(std::io::stderr)), None),
        // Development: Pretty formatting with colors
        _ => (None, Some(fmt::layer().pretty().with_writer(std::io::stderr))),
    };

    let (file_layer, guard) = match config.file.as_deref() {
        Some(file) => {
            let path = crate::settings::expand(file);
            let (writer, guard) = file_writer(&path)?;
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(pretty)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log dir {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, name);
    Ok(tracing_appender::non_blocking(appender))
}
