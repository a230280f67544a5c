//! Per-run tracing setup.
//!
//! Every run logs at debug level to `<output>/log/sheetproto.log` and at the
//! configured level to stderr. The subscriber is installed as the thread's
//! default only for the lifetime of the returned [`LogContext`], which spans
//! one workbook run. File writes are unbuffered, so every finished sheet is
//! already on disk when the next one starts.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::config::SheetprotoConfig;

pub const RUN_LOG_FILE: &str = "sheetproto.log";

pub struct LogContext {
    path: PathBuf,
    _guard: DefaultGuard,
}

impl LogContext {
    /// Path of the run log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn stderr_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Creates the log directory, truncates the run log and installs the
/// subscriber for the current thread.
pub fn init(config: &SheetprotoConfig) -> io::Result<LogContext> {
    let dir = config.log_dir();
    fs::create_dir_all(&dir)?;
    let path = dir.join(RUN_LOG_FILE);
    let file = File::create(&path)?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(stderr_filter(&config.log_level));

    let subscriber = Registry::default().with(file_layer).with(stderr_layer);
    let guard = tracing::subscriber::set_default(subscriber);
    tracing::debug!(path = %path.display(), "run log opened");
    Ok(LogContext {
        path,
        _guard: guard,
    })
}
