//! Logging Infrastructure
//!
//! Console output by default; with a log directory, a daily rolling file
//! (`storeflow-server.YYYY-MM-DD`) instead. `RUST_LOG` overrides the level.

use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_PREFIX: &str = "storeflow-server";

/// Days of rolling log files kept by [`cleanup_old_logs`]
pub const LOG_RETENTION_DAYS: i64 = 14;

/// Delete rolling log files older than `keep_days`. Returns how many were removed.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: i64) -> anyhow::Result<usize> {
    let cutoff = Local::now().date_naive() - Duration::days(keep_days);
    let mut removed = 0;

    let entries = std::fs::read_dir(log_dir)
        .with_context(|| format!("reading log directory {}", log_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date_part) = name.strip_prefix(LOG_FILE_PREFIX).and_then(|d| d.strip_prefix('.'))
            && let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            && date < cutoff
        {
            std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Initialize the logger with optional file output.
///
/// Returns the appender guard when logging to a file; keep it alive for the
/// life of the process or buffered lines are lost.
pub fn init_logger_with_file(
    log_level: &str,
    log_dir: Option<&str>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("storeflow_server={log_level},tower_http={log_level},{log_level}"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if std::fs::create_dir_all(log_path).is_ok() {
            let file_appender = tracing_appender::rolling::daily(log_path, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            subscriber.with_ansi(false).with_writer(writer).init();
            return Some(guard);
        }
        eprintln!("Log directory {dir} is not writable, logging to stdout");
    }

    subscriber.init();
    None
}
