//! Typed telemetry configuration.
//!
//! Every field has a default, so an empty JSON object `{}` is a complete
//! configuration. Unknown fields are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::validate::{ValidationError, ValidationResult};

/// Root telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub schema_version: String,
    pub events: EventsConfig,
    pub processes: ProcessesConfig,
    pub interactions: InteractionsConfig,
    pub analyzer: AnalyzerConfig,
    pub sanitize: SanitizeConfig,
    pub storage: StorageConfig,
    pub maintenance: MaintenanceConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            events: EventsConfig::default(),
            processes: ProcessesConfig::default(),
            interactions: InteractionsConfig::default(),
            analyzer: AnalyzerConfig::default(),
            sanitize: SanitizeConfig::default(),
            storage: StorageConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

/// Event Bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Maximum events kept in memory; oldest dropped first.
    pub capacity: usize,
    /// Performance events above this duration are WARNING.
    pub slow_operation_ms: f64,
    /// Per-entry cap on serialized metadata values.
    pub max_metadata_value_len: usize,
    /// Mirror every event to the log at debug level.
    pub dev_mode: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            slow_operation_ms: 1000.0,
            max_metadata_value_len: 65536,
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessesConfig {
    /// Completed/cancelled processes kept in history.
    pub history_capacity: usize,
}

impl Default for ProcessesConfig {
    fn default() -> Self {
        Self {
            history_capacity: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteractionsConfig {
    pub capacity: usize,
    /// Quiet period before a scroll burst is recorded.
    pub scroll_debounce_ms: u64,
    /// Input values longer than this are replaced by a fixed placeholder.
    pub max_input_len: usize,
    /// Element text content is truncated to this many characters.
    pub max_text_len: usize,
}

impl Default for InteractionsConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            scroll_debounce_ms: 200,
            max_input_len: 100,
            max_text_len: 50,
        }
    }
}

/// Deep error analyzer windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// How far back the timeline looks, in milliseconds.
    pub lookback_ms: i64,
    pub recent_events: usize,
    pub recent_state_changes: usize,
    pub recent_user_actions: usize,
    pub recent_api_calls: usize,
    pub process_history: usize,
    pub console_lines: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lookback_ms: 60_000,
            recent_events: 10,
            recent_state_changes: 10,
            recent_user_actions: 10,
            recent_api_calls: 5,
            process_history: 20,
            console_lines: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SanitizeConfig {
    /// State-change values above this many serialized characters become a placeholder.
    pub max_state_value_len: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            max_state_value_len: 1000,
        }
    }
}

/// Critical-event persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub enabled: bool,
    /// Directory for persisted critical events; platform data dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    pub max_persisted: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_persisted: 50,
        }
    }
}

impl StorageConfig {
    /// Configured directory, else the platform default.
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.dir.clone().or_else(crate::resolve::default_storage_dir)
    }
}

/// Periodic housekeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaintenanceConfig {
    /// Events and finished processes older than this are dropped.
    pub max_event_age_ms: i64,
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_event_age_ms: 3_600_000,
            interval_secs: 300,
        }
    }
}

impl TelemetryConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> ValidationResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> ValidationResult<Self> {
        serde_json::from_str(json).map_err(|e| ValidationError::ParseError(e.to_string()))
    }

    /// Apply environment overrides (`FH_TELEMETRY_DEV_MODE`).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(crate::resolve::ENV_DEV_MODE) {
            match parse_bool(&value) {
                Some(flag) => self.events.dev_mode = flag,
                None => tracing::warn!(
                    var = crate::resolve::ENV_DEV_MODE,
                    value = %value,
                    "ignoring unparsable boolean override"
                ),
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = TelemetryConfig::from_str("{}").unwrap();
        assert_eq!(config, TelemetryConfig::default());
        assert_eq!(config.events.capacity, 1000);
        assert_eq!(config.interactions.scroll_debounce_ms, 200);
        assert_eq!(config.analyzer.recent_api_calls, 5);
        assert_eq!(config.storage.max_persisted, 50);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = TelemetryConfig::from_str(r#"{"events": {"capacity": 10}}"#).unwrap();
        assert_eq!(config.events.capacity, 10);
        assert_eq!(config.events.slow_operation_ms, 1000.0);
        assert_eq!(config.processes.history_capacity, 200);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = TelemetryConfig::from_str(r#"{"events": {"capacty": 10}}"#).unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
