use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

pub const DEFAULT_LOG_FILTER: &str = "info,device_stream_server=debug,tower_http=info";

/// Prefix of the rotated log files, `device-stream.<date>.log`.
pub const LOG_FILE_PREFIX: &str = "device-stream";

/// Output encoding for both sinks. Anything other than `json` reads as pretty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl From<String> for LogFormat {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Install the global subscriber: stdout plus a daily-rotated file.
///
/// `RUST_LOG` selects levels. File writes go through a background worker;
/// keep the returned guard alive until shutdown so buffered lines get flushed.
pub fn init_logger(config: &LoggingConfig) -> Result<WorkerGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let filter = EnvFilter::try_new(&log_level)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let json = config.format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_writer(std::io::stdout)
                .with_target(true)
                .with_thread_ids(true)
        }))
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_writer(file_writer.clone())
                .with_target(true)
                .with_thread_ids(true)
        }))
        .with((!json).then(|| fmt::layer().pretty().with_writer(std::io::stdout).with_target(true)))
        .with((!json).then(|| {
            fmt::layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
        }))
        .try_init()?;

    info!(
        format = ?config.format,
        directory = %config.directory,
        "{} logging to {}.*.log",
        env!("CARGO_PKG_NAME"),
        config.file_prefix
    );

    Ok(guard)
}
