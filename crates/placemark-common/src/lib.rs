//! Shared utilities for placemark crates
//!
//! Logging initialisation and error formatting used by the store, the gallery
//! integrations and their binaries or test harnesses.

pub mod logging;

pub use logging::{format_error, init, LogLevel, LogOptions, LoggingError};
