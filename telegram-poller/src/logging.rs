//! Logging setup for applications embedding the poller
//!
//! The library itself only emits `tracing` events. These helpers install a
//! subscriber for binaries and examples that do not bring their own.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; events are discarded
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output with source locations at `debug`
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `TELEGRAM_POLLER_LOG_LEVEL`: filter directive overriding the mode's default level
/// - `RUST_LOG`: used when `TELEGRAM_POLLER_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => install(mode, create_env_filter("info")?),
        LoggingMode::Debug => install(mode, create_env_filter("debug")?),
    }
}

/// Initialize logging with an explicit filter directive
///
/// `directive` takes precedence over the environment variables read by
/// [`init_logging`].
pub fn init_logging_with_level(mode: LoggingMode, directive: &str) -> Result<(), LoggingError> {
    match mode {
        LoggingMode::Silent => Ok(()),
        _ => install(mode, parse_filter(directive)?),
    }
}

/// Initialize logging from `TELEGRAM_POLLER_LOG_MODE`, silent when unset
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from_env().unwrap_or(LoggingMode::Silent))
}

/// Logging mode named by `TELEGRAM_POLLER_LOG_MODE`, if any
///
/// - "silent" -> LoggingMode::Silent
/// - "development" -> LoggingMode::Development
/// - "debug" -> LoggingMode::Debug
pub fn mode_from_env() -> Option<LoggingMode> {
    parse_mode(std::env::var("TELEGRAM_POLLER_LOG_MODE").ok().as_deref())
}

fn parse_mode(value: Option<&str>) -> Option<LoggingMode> {
    match value.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("silent") => Some(LoggingMode::Silent),
        Some(v) if v.eq_ignore_ascii_case("development") => Some(LoggingMode::Development),
        Some(v) if v.eq_ignore_ascii_case("debug") => Some(LoggingMode::Debug),
        _ => None,
    }
}

/// Build a filter from `TELEGRAM_POLLER_LOG_LEVEL`, then `RUST_LOG`, then `default_level`
pub fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var("TELEGRAM_POLLER_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    parse_filter(&directive)
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        filter: directive.to_string(),
        reason: e.to_string(),
    })
}

fn install(mode: LoggingMode, filter: EnvFilter) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let result = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}
