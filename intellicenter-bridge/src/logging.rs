//! Logging setup for the bridge
//!
//! All output goes to stderr: stdout carries the display protocol and must
//! never see a log line.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    #[default]
    Development,
    /// Verbose diagnostics with source locations
    Debug,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(LoggingError::InvalidEnv(format!(
                "unknown logging mode '{}'",
                other
            ))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `INTELLICENTER_LOG_LEVEL`: Override the filter (e.g. `debug`, `intellicenter_api=trace`)
/// - `RUST_LOG`: Used when `INTELLICENTER_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .compact(),
                )
                .with(filter);

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            let subscriber = Registry::default()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter);

            subscriber
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Resolve the mode from `INTELLICENTER_LOG_MODE`, falling back to `fallback`
pub fn mode_from_env(fallback: LoggingMode) -> Result<LoggingMode, LoggingError> {
    match std::env::var("INTELLICENTER_LOG_MODE") {
        Ok(value) => value.parse(),
        Err(_) => Ok(fallback),
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("INTELLICENTER_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("bad log filter '{}': {}", directives, e)))
}
