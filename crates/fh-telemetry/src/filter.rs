//! Event log queries.

use fh_common::{Category, Severity, TelemetryEvent};
use serde::{Deserialize, Serialize};

/// Criteria for [`crate::TelemetryCore::get_events`].
///
/// Every set criterion must match; an empty filter matches everything.
/// `tags` matches events carrying any one of the listed tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Only events at or after this timestamp (ms since epoch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Exact severity match.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn since(mut self, timestamp_ms: i64) -> Self {
        self.since = Some(timestamp_ms);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn matches(&self, event: &TelemetryEvent) -> bool {
        if let Some(category) = self.category {
            if event.category != category {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if event.severity != severity {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|t| event.has_tag(t)) {
            return false;
        }
        true
    }
}
