//! Structured telemetry event record and its taxonomy.
//!
//! Events are immutable once created: the event bus builds them, pushes
//! them into its bounded log, and only ever drops them by age or capacity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::id::{EventId, SessionId};

/// Open key/value metadata attached to events, flows and reports.
///
/// Ordered so that exports and rendered reports are deterministic.
pub type Metadata = BTreeMap<String, Value>;

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    UserAction,
    StateChange,
    ApiCall,
    Navigation,
    Error,
    Performance,
    DataMutation,
    Render,
    Lifecycle,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 9] = [
        Category::UserAction,
        Category::StateChange,
        Category::ApiCall,
        Category::Navigation,
        Category::Error,
        Category::Performance,
        Category::DataMutation,
        Category::Render,
        Category::Lifecycle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::UserAction => "USER_ACTION",
            Category::StateChange => "STATE_CHANGE",
            Category::ApiCall => "API_CALL",
            Category::Navigation => "NAVIGATION",
            Category::Error => "ERROR",
            Category::Performance => "PERFORMANCE",
            Category::DataMutation => "DATA_MUTATION",
            Category::Render => "RENDER",
            Category::Lifecycle => "LIFECYCLE",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown event category: {}", s))
    }
}

/// Ordinal importance of an event (DEBUG < INFO < WARNING < ERROR < CRITICAL).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    /// ERROR and CRITICAL events carry stack traces and are persisted.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" | "fatal" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: EventId,
    /// Creation time, integer milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub category: Category,
    pub severity: Severity,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Duration in milliseconds for paired performance events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl TelemetryEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(
        category: Category,
        severity: Severity,
        name: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        TelemetryEvent {
            id: EventId::new(),
            timestamp: crate::now_millis(),
            category,
            severity,
            name: name.into(),
            metadata: Metadata::new(),
            tags: Vec::new(),
            session_id,
            user_id: None,
            duration: None,
            stack_trace: None,
        }
    }

    /// Look up a metadata value by key.
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Metadata value as a string slice, if it is a JSON string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Metadata value as an unsigned integer, if it is numeric.
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.name
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serialization() {
        assert_eq!(
            serde_json::to_string(&Category::UserAction).unwrap(),
            "\"USER_ACTION\""
        );
        assert_eq!(
            serde_json::to_string(&Category::DataMutation).unwrap(),
            "\"DATA_MUTATION\""
        );
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("api_call".parse::<Category>().unwrap(), Category::ApiCall);
        assert_eq!("API-CALL".parse::<Category>().unwrap(), Category::ApiCall);
        assert!("bogus".parse::<Category>().is_err());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
        assert!(Severity::Critical.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn test_severity_parse_and_display() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::default(), Severity::Info);
    }

    #[test]
    fn test_event_jsonl_skips_empty_fields() {
        let event = TelemetryEvent::new(
            Category::Navigation,
            Severity::Info,
            "NAVIGATION",
            SessionId("fh-20260115-143022-a7xq".to_string()),
        );
        let json = event.to_jsonl();
        assert!(json.contains(r#""category":"NAVIGATION""#));
        assert!(json.contains(r#""severity":"INFO""#));
        assert!(!json.contains("stack_trace"));
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_meta_accessors() {
        let mut event = TelemetryEvent::new(
            Category::ApiCall,
            Severity::Error,
            "API_CALL",
            SessionId::new(),
        );
        event
            .metadata
            .insert("status".to_string(), serde_json::json!(500));
        event
            .metadata
            .insert("endpoint".to_string(), serde_json::json!("/api/tx"));
        assert_eq!(event.meta_u64("status"), Some(500));
        assert_eq!(event.meta_str("endpoint"), Some("/api/tx"));
        assert_eq!(event.meta_str("status"), None);
    }
}
