//! Structured logging setup.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LoggingSection};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Parse an `EnvFilter` directive, falling back to "info" when invalid.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// A valid, non-empty `RUST_LOG` wins over the configured level.
pub fn resolve_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| build_filter(level))
}

/// Install the global subscriber. Logs go to stderr, and also to a daily
/// rotated file when `logging.file` is set. The returned guard must be held
/// for the life of the process so buffered file output is flushed.
pub fn init_tracing(logging: &LoggingSection) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    layers.push(match logging.format {
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    });

    let mut guard = None;
    if let Some(path) = &logging.file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = tracing_appender::rolling::daily(dir, file_name);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        layers.push(match logging.format {
            LogFormat::Pretty => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        });
        guard = Some(worker_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(resolve_filter(
            std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
            &logging.level,
        ))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
