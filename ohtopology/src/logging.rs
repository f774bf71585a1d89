//! Logging setup for applications embedding the topology engine.
//!
//! The engine itself only emits `tracing` events; nothing is printed unless
//! the host installs a subscriber, either its own or one of the presets here.
//!
//! # Environment Variables
//!
//! - `OHTOPOLOGY_LOG_MODE`: `silent`, `development`, `debug` or `json`
//! - `OHTOPOLOGY_LOG_LEVEL`: filter directive, e.g. `ohtopology=debug`;
//!   falls back to `RUST_LOG`, then to the mode's default level

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Install nothing
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose stderr output with thread names and source locations at `debug`
    Debug,
    /// One JSON object per line at `info`, for log shippers
    Json,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "off" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            "json" => Ok(LoggingMode::Json),
            other => Err(LoggingError::InvalidEnv(format!(
                "OHTOPOLOGY_LOG_MODE={}",
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

/// Install the subscriber for `mode`.
///
/// Fails if another global subscriber is already installed.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    let result = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development => Registry::default()
            .with(filter_for("info"))
            .with(fmt::layer().compact().with_target(false))
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(filter_for("debug"))
            .with(
                fmt::layer()
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(filter_for("info"))
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Install the subscriber named by `OHTOPOLOGY_LOG_MODE`.
///
/// An unset variable means [`LoggingMode::Silent`]; an unrecognised value is
/// an error rather than a silent fallback.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("OHTOPOLOGY_LOG_MODE") {
        Ok(value) => value.parse()?,
        Err(_) => LoggingMode::Silent,
    };
    init_logging(mode)
}

/// Same as `init_logging(LoggingMode::Silent)`.
pub fn init_silent() -> Result<(), LoggingError> {
    init_logging(LoggingMode::Silent)
}

/// Whether any global subscriber has been installed.
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

fn filter_for(default_level: &str) -> EnvFilter {
    std::env::var("OHTOPOLOGY_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
        assert!(init_silent().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("json".parse::<LoggingMode>().unwrap(), LoggingMode::Json);
        assert_eq!(" Debug ".parse::<LoggingMode>().unwrap(), LoggingMode::Debug);
        assert_eq!("dev".parse::<LoggingMode>().unwrap(), LoggingMode::Development);
        assert!(matches!(
            "loud".parse::<LoggingMode>(),
            Err(LoggingError::InvalidEnv(_))
        ));
    }
}
