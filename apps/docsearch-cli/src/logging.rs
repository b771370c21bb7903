//! Logging setup: stderr for the operator, a daily file for everything.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use docsearch_core::config::{expand_path, LogSettings};

pub const LOG_FILE: &str = "docsearch.log";

/// Stderr verbosity from the number of `-v` flags.
pub fn console_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// File filter: `RUST_LOG` when set, else `log.level`, else info.
fn file_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. The returned guard flushes the file
/// writer on drop and must live until exit.
pub fn init(settings: &LogSettings, verbose: u8) -> anyhow::Result<WorkerGuard> {
    let dir = expand_path(&settings.dir);
    std::fs::create_dir_all(&dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_level(verbose)),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(file_filter(&settings.level)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    tracing::debug!(dir = %dir.display(), "logging initialized");
    Ok(guard)
}
