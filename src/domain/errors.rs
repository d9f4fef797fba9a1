//! Domain error types
//!
//! This module defines the error hierarchy for Meridian. Entity-level
//! errors (`BuilderData`, `CacheMiss`) are absorbed at the call site with a
//! log line so a single bad row never discards a whole admission;
//! `Configuration` errors abort the run before any work begins; `Dispatch`
//! errors are surfaced per sink without halting the pipeline.

use thiserror::Error;

/// Main Meridian error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum MeridianError {
    /// Configuration-related errors; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed or missing source entity data; the offending entity is
    /// skipped and processing continues
    #[error("Builder data error: {0}")]
    BuilderData(String),

    /// A reference resolved to no cached or creatable entity
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    /// A sink failed to accept a dispatched message
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Source database errors
    #[error("Source error: {0}")]
    Source(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for MeridianError {
    fn from(err: std::io::Error) -> Self {
        MeridianError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MeridianError {
    fn from(err: serde_json::Error) -> Self {
        MeridianError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeridianError {
    fn from(err: toml::de::Error) -> Self {
        MeridianError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<reqwest::Error> for MeridianError {
    fn from(err: reqwest::Error) -> Self {
        MeridianError::Connection(err.to_string())
    }
}

impl From<tokio_postgres::Error> for MeridianError {
    fn from(err: tokio_postgres::Error) -> Self {
        MeridianError::Source(err.to_string())
    }
}
