//! Error types for the edges of the telemetry subsystem.
//!
//! Tracking and reporting calls never fail the operation they observe.
//! These errors surface only where a user asked for something explicit:
//! loading configuration or delivering a report. Each carries a stable
//! code, a category and a remediation hint.
//!
//! ```text
//! ✗ Export Failed
//!   Reason: could not write report to /tmp/ro: permission denied
//!   Fix: Check that the output directory exists and is writable.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Error grouping, serialized in snake case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Delivery,
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Delivery => "delivery",
            ErrorCategory::Io => "io",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid telemetry config: {0}")]
    InvalidConfig(String),

    #[error("clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("could not write report to {}: {reason}", path.display())]
    ExportFailed { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Static description of one error variant.
struct Descriptor {
    code: u32,
    category: ErrorCategory,
    headline: &'static str,
    remediation: &'static str,
}

impl Error {
    fn descriptor(&self) -> Descriptor {
        let (code, category, headline, remediation) = match self {
            Error::Config(_) => (
                10,
                ErrorCategory::Config,
                "Configuration Error",
                "Run 'fh-core config validate' to check the telemetry configuration.",
            ),
            Error::InvalidConfig(_) => (
                11,
                ErrorCategory::Config,
                "Invalid Configuration",
                "Fix the reported field in telemetry.json or remove it to use the default.",
            ),
            Error::ClipboardUnavailable(_) => (
                30,
                ErrorCategory::Delivery,
                "Clipboard Unavailable",
                "Install wl-copy, xclip or xsel, or save the report with --out instead.",
            ),
            Error::ExportFailed { .. } => (
                31,
                ErrorCategory::Delivery,
                "Export Failed",
                "Check that the output directory exists and is writable.",
            ),
            Error::Io(_) => (
                60,
                ErrorCategory::Io,
                "I/O Error",
                "Check permissions and that the target directories exist.",
            ),
            Error::Json(_) => (
                61,
                ErrorCategory::Io,
                "JSON Error",
                "The file is not valid JSON. Check its syntax or restore a backup.",
            ),
        };
        Descriptor {
            code,
            category,
            headline,
            remediation,
        }
    }

    /// Stable code: 10-19 config, 30-39 delivery, 60-69 I/O.
    pub fn code(&self) -> u32 {
        self.descriptor().code
    }

    pub fn category(&self) -> ErrorCategory {
        self.descriptor().category
    }

    pub fn headline(&self) -> &'static str {
        self.descriptor().headline
    }

    pub fn remediation(&self) -> &'static str {
        self.descriptor().remediation
    }
}

/// Machine-readable form of an [`Error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();
        if let Error::ExportFailed { path, .. } = err {
            context.insert(
                "path".to_string(),
                serde_json::json!(path.display().to_string()),
            );
        }
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            context,
        }
    }
}

impl StructuredError {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Three-line stderr rendering: headline, reason, fix.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };
    format!(
        "{red}✗{reset} {}\n  Reason: {}\n  {cyan}Fix:{reset} {}",
        err.headline(),
        err,
        err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_categories() {
        let errors = [
            Error::Config("x".into()),
            Error::InvalidConfig("x".into()),
            Error::ClipboardUnavailable("x".into()),
            Error::ExportFailed {
                path: PathBuf::from("/tmp/x"),
                reason: "denied".into(),
            },
            Error::Io(std::io::Error::other("x")),
        ];
        for err in &errors {
            let expected = match err.code() {
                10..=19 => ErrorCategory::Config,
                30..=39 => ErrorCategory::Delivery,
                _ => ErrorCategory::Io,
            };
            assert_eq!(err.category(), expected, "{}", err);
        }
    }

    #[test]
    fn test_structured_error_carries_path() {
        let err = Error::ExportFailed {
            path: PathBuf::from("/tmp/reports"),
            reason: "read-only file system".into(),
        };
        let json = StructuredError::from(&err).to_json();
        assert!(json.contains(r#""code":31"#));
        assert!(json.contains(r#""category":"delivery""#));
        assert!(json.contains(r#""path":"/tmp/reports""#));
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::ClipboardUnavailable("no helper accepted the report".into());
        let plain = format_error_human(&err, false);
        assert!(plain.starts_with("✗ Clipboard Unavailable"));
        assert!(plain.contains("Reason: clipboard unavailable: no helper"));
        assert!(plain.contains("--out"));
        assert!(format_error_human(&err, true).contains("\x1b[31m"));
    }
}
