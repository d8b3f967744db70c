//! Error types for report rendering and delivery.

use thiserror::Error;

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors that can occur while rendering or delivering a report.
#[derive(Error, Debug)]
pub enum ReportError {
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// No clipboard backend accepted the text.
    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
