//! Logging configuration.
//!
//! Sources, lowest to highest precedence:
//! - `RUST_LOG` (coarse level sniffing only; the directives themselves
//!   are handed to the env filter)
//! - `FH_LOG`, `FH_LOG_FORMAT`
//! - CLI flags (`-v`, `-q`, `--log-format`)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

/// Level override, e.g. `FH_LOG=debug`. Wins over `RUST_LOG`.
pub const ENV_LOG: &str = "FH_LOG";

/// Format override: `human` or `jsonl`.
pub const ENV_LOG_FORMAT: &str = "FH_LOG_FORMAT";

/// Crates whose targets the default filter enables.
const WORKSPACE_TARGETS: [&str; 5] = [
    "fh_core",
    "fh_telemetry",
    "fh_report",
    "fh_config",
    "fh_redact",
];

/// Where log lines on stderr are meant to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line, for log shippers.
    Jsonl,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(LogFormat::Human),
            "jsonl" | "json" | "ndjson" => Ok(LogFormat::Jsonl),
            other => Err(format!("unknown log format '{}' (expected human or jsonl)", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        })
    }
}

/// Minimum level written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Off,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Most verbose level mentioned anywhere in a `RUST_LOG` value.
    fn sniff(directives: &str) -> Option<LogLevel> {
        let lower = directives.to_ascii_lowercase();
        Self::ALL[..5]
            .iter()
            .copied()
            .find(|level| lower.contains(level.as_str()))
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "warning" => return Ok(LogLevel::Warn),
            "none" | "quiet" | "silent" => return Ok(LogLevel::Off),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown log level '{}'", s))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logging setup for one process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Timestamps in human output.
    pub timestamps: bool,
    /// `file:line` in human output.
    pub source_location: bool,
    /// Keep recent INFO/WARN/ERROR lines for forensic reports.
    pub capture_console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            timestamps: true,
            source_location: false,
            capture_console: true,
        }
    }
}

impl LogConfig {
    /// Resolve from the process environment, then CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Resolve with an explicit variable lookup.
    ///
    /// Unparsable values are ignored rather than rejected; a typo in
    /// `FH_LOG` must not keep the CLI from starting.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let env_level = lookup(ENV_LOG)
            .and_then(|v| v.parse().ok())
            .or_else(|| lookup("RUST_LOG").as_deref().and_then(LogLevel::sniff));
        let env_format = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok());

        let mut config = LogConfig::default();
        if let Some(level) = cli_level.or(env_level) {
            config.level = level;
        }
        if let Some(format) = cli_format.or(env_format) {
            config.format = format;
        }
        // file:line is only worth the noise when debugging
        config.source_location = config.level <= LogLevel::Debug;
        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn with_console_capture(mut self, enabled: bool) -> Self {
        self.capture_console = enabled;
        self
    }

    /// Env filter directive used when `RUST_LOG` is not set:
    /// workspace crates at the configured level, everything else off.
    pub fn filter_directive(&self) -> String {
        WORKSPACE_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Jsonl));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Human));
        assert!("xml".parse::<LogFormat>().is_err());

        assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("quiet".parse::<LogLevel>(), Ok(LogLevel::Off));
        assert_eq!("trace".parse::<LogLevel>(), Ok(LogLevel::Trace));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_fh_log_beats_rust_log() {
        let config = LogConfig::resolve(
            env(&[("FH_LOG", "warn"), ("RUST_LOG", "fh_core=trace")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn test_rust_log_sniffing_picks_most_verbose() {
        let config = LogConfig::resolve(
            env(&[("RUST_LOG", "hyper=error,fh_telemetry=debug")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.source_location);
    }

    #[test]
    fn test_bad_env_values_fall_back() {
        let config = LogConfig::resolve(
            env(&[("FH_LOG", "chatty"), ("FH_LOG_FORMAT", "yaml")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Human);
        assert!(!config.source_location);
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = LogConfig::resolve(
            env(&[("FH_LOG", "trace"), ("FH_LOG_FORMAT", "human")]),
            Some(LogLevel::Error),
            Some(LogFormat::Jsonl),
        );
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn test_filter_directive_covers_workspace_crates() {
        let directive = LogConfig::default()
            .with_level(LogLevel::Debug)
            .filter_directive();
        for target in WORKSPACE_TARGETS {
            assert!(directive.contains(&format!("{}=debug", target)));
        }
        assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::OFF);
    }
}
