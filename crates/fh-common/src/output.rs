//! Output formats for rendered reports.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Full Markdown report intended for pasting into an LLM chat (default)
    #[default]
    Md,

    /// Condensed Markdown report
    Quick,

    /// Structured JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Quick => write!(f, "quick"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
