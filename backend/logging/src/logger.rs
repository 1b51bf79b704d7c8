//! Structured Logger
//!
//! Wraps `tracing` to provide console output, optional daily-rolling file
//! output (NDJSON or plain), and environment-based level control.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "proxpanel.log";

/// `RUST_LOG` wins over the configured level; an unparseable level falls back to `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global structured logger.
///
/// With `log_dir` set, events are also written to
/// `<log_dir>/proxpanel.log.YYYY-MM-DD`, as NDJSON when `json` is true.
/// Calling this twice is a no-op.
pub fn init_logger(level: &str, log_dir: Option<&Path>, json: bool) {
    let file_appender =
        log_dir.map(|dir| RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX));

    let (json_layer, plain_layer) = match file_appender {
        Some(appender) if json => (
            Some(fmt::layer().json().with_writer(appender).with_ansi(false)),
            None,
        ),
        Some(appender) => (None, Some(fmt::layer().with_writer(appender).with_ansi(false))),
        None => (None, None),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(console_layer)
        .with(json_layer)
        .with(plain_layer)
        .try_init();
}
