//! Console and log-file setup.
//!
//! INFO and above go to stderr (`RUST_LOG` overrides the level). During a
//! sweep everything down to DEBUG also goes to a timestamped file in the log
//! directory.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Keeps the file writer alive; drop it only at exit so buffered lines are
/// flushed.
pub struct LogHandle {
    pub file: PathBuf,
    _guard: WorkerGuard,
}

/// `<prefix>-YYYY-MM-DD-HHMMSS.log`
pub fn log_file_name(prefix: &str) -> String {
    format!("{prefix}-{}.log", Local::now().format("%Y-%m-%d-%H%M%S"))
}

fn console_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter)
}

/// Console only. Used by listing runs, which must not touch the disk.
pub fn init_console() -> Result<()> {
    Registry::default()
        .with(console_layer())
        .try_init()
        .context("Installing logger")
}

pub fn init(log_dir: &Path, prefix: &str) -> Result<LogHandle> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Unable to create log directory {}", log_dir.display()))?;

    let file_name = log_file_name(prefix);
    let appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);

    Registry::default()
        .with(console_layer())
        .with(file)
        .try_init()
        .context("Installing logger")?;

    Ok(LogHandle {
        file: log_dir.join(file_name),
        _guard: guard,
    })
}
