//! Captured log lines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of a captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "📝",
            ConsoleLevel::Warn => "⚠️",
            ConsoleLevel::Error => "🔴",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One captured line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub level: ConsoleLevel,
    /// Log target, usually the emitting module path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    pub message: String,
}
