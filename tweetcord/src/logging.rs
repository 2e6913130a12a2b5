//! Logging bootstrap.
//!
//! Console output always; daily-rotated file output when a log directory is
//! given. Timestamps use the local timezone.

use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{AppError, Result};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "tweetcord=info,tweetwatch=info";

/// Filter directive used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "tweetcord=debug,tweetwatch=debug";

/// Prefix of rotated log files (`tweetcord.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "tweetcord.log";

#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Resolve the filter: `--verbose` wins, then `RUST_LOG`, then the default.
pub fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Initialize the global subscriber.
///
/// Returns the file writer guard when file output is enabled; keep it alive
/// for the lifetime of the process so buffered lines are flushed.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))?;

    Ok(guard)
}
