//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::error::ConfigError;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Default directory for JSON log files.
pub fn default_log_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "sleuth", "sleuth")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Install the global subscriber: human-readable stderr output and,
/// when enabled, JSON lines in a daily rolling file.
///
/// Keep the returned guard alive for as long as file logging should flush.
/// Returns `None` when file logging is off. A subscriber that is already
/// installed is left in place. Fails if the log directory cannot be created
/// or opened.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter(&config.level));

    let (json_layer, guard) = if config.json_file {
        let log_dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
        let log_dir_error = |message: String| ConfigError::LogDir {
            path: log_dir.clone(),
            message,
        };
        std::fs::create_dir_all(&log_dir).map_err(|e| log_dir_error(e.to_string()))?;
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("sleuth.log")
            .build(&log_dir)
            .map_err(|e| log_dir_error(e.to_string()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new("debug"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init();

    Ok(guard)
}

/// `RUST_LOG` wins over the configured level when set.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
