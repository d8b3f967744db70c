//! Log levels and stable log targets for fh-core.

use serde::{Deserialize, Serialize};

/// Log level as written to JSONL output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Targets used by fh-core log lines.
///
/// Consumers of the JSONL stream filter on the `event` key, which carries
/// the target.
pub mod targets {
    pub const FLOW: &str = "fh_core::flow";
    pub const INTERACTION: &str = "fh_core::interaction";
    pub const ANALYZER: &str = "fh_core::analyzer";
    pub const RUNTIME: &str = "fh_core::runtime";
    pub const CLI: &str = "fh_core::cli";
}
