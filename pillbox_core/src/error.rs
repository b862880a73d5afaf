//! Error types for the pillbox_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pillbox_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schedule validation error (bad name, time, or day set)
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Medicine store error
    #[error("Store error: {0}")]
    Store(String),

    /// Notification delivery error
    #[error("Notify error: {0}")]
    Notify(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
