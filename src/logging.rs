use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{AppError, AppResult};

pub const LOG_ENV: &str = "RENTALA_LOG";
pub const LOG_FILE_NAME: &str = "rentala.log";
const DEFAULT_FILTER: &str = "rentala=info,sqlx=warn";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// JSON lines on stderr instead of the human format.
    pub json: bool,
    /// Also write JSON lines to a daily-rolling file in this directory.
    pub file_dir: Option<PathBuf>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Keep the returned guard alive for as long
/// as the file sink should flush.
pub fn init_with(options: &LogOptions) -> AppResult<Option<WorkerGuard>> {
    let (file_writer, guard) = match &options.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| AppError::from(e).with_context("path", dir.display().to_string()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = options.json.then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
    });
    let plain_layer = (!options.json).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| {
            AppError::new("LOGGING/INIT", "Failed to install tracing subscriber")
                .with_context("error", err.to_string())
        })?;

    Ok(guard)
}
