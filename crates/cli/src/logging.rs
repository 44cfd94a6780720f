//! Logging setup.
//!
//! Diagnostics go to stderr at the configured level (`warn` by default so
//! they stay out of the operator's way). `RUST_LOG` overrides it. A log file,
//! when configured, receives debug-level output through a non-blocking
//! writer.

use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use gitsvnmerge_core::config::{expand_tilde, LoggingSection};

const FILE_FILTER: &str = "gitsvnmerge_core=debug,merge_svn=debug";

/// Guard that must be held to ensure logs are flushed.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// The stderr level for a `-v` count, falling back to the configured level.
pub fn stderr_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_lowercase(),
        1 => "info".into(),
        _ => "debug".into(),
    }
}

#[must_use = "the returned guard must be held until application exit"]
pub fn init_logging(config: &LoggingSection, verbose: u8) -> Result<LogGuard> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(stderr_level(&config.log_level, verbose)));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(stderr_filter);

    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let path = expand_tilde(path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to initialise logging")?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
