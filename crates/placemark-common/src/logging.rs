//! Logging setup for placemark
//!
//! - Minimum log level configuration (parsed from config/env strings)
//! - `tracing-subscriber` fmt output on stderr
//! - Error cause-chain formatting

use thiserror::Error;

/// Log levels accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse log level from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Some(LogLevel::Trace),
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Minimum log level (defaults to INFO)
    pub level: Option<LogLevel>,
    /// Emit ANSI colour codes
    pub ansi: bool,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: None,
            ansi: true,
            with_target: false,
        }
    }
}

impl LogOptions {
    /// Options for a given level string, falling back to INFO when it does not parse
    pub fn from_level_str(level: &str) -> Self {
        Self {
            level: LogLevel::from_str(level),
            ..Self::default()
        }
    }
}

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was installed earlier in this process
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install the global tracing subscriber
pub fn init(options: LogOptions) -> Result<(), LoggingError> {
    let level = options.level.unwrap_or(LogLevel::Info);

    tracing_subscriber::fmt()
        .with_max_level(level.as_tracing())
        .with_ansi(options.ansi)
        .with_target(options.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(level = level.as_str(), "Logging initialized");
    Ok(())
}

/// Format an error with cause chain
pub fn format_error(error: &dyn std::error::Error) -> String {
    format_error_recursive(error, 0)
}

fn format_error_recursive(error: &dyn std::error::Error, depth: usize) -> String {
    const MAX_DEPTH: usize = 10;

    if depth >= MAX_DEPTH {
        return error.to_string();
    }

    let base = error.to_string();

    if let Some(source) = error.source() {
        format!("{} Caused by: {}", base, format_error_recursive(source, depth + 1))
    } else {
        base
    }
}
