//! What most plausibly set the failure off.

use serde::{Deserialize, Serialize};

/// A failed API call (status >= 400).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    /// Event name, `METHOD endpoint`.
    pub name: String,
    pub method: Option<String>,
    pub endpoint: Option<String>,
    pub status: u16,
    pub timestamp: i64,
}

impl ApiFailure {
    pub fn label(&self) -> String {
        format!("{} -> {}", self.name, self.status)
    }
}

/// Derived trigger chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSection {
    /// Name of the most recent event overall.
    pub direct_cause: Option<String>,
    /// Name of the most recent user action.
    pub user_action: Option<String>,
    /// Most recent failed API call, if any.
    pub api_failure: Option<ApiFailure>,
    /// Name of the most recent state change.
    pub state_change: Option<String>,
    /// Names of the last few events, oldest first.
    #[serde(default)]
    pub sequence: Vec<String>,
}

impl TriggerSection {
    /// Sequence joined with arrows, e.g. `a → b → c`.
    pub fn sequence_text(&self) -> String {
        if self.sequence.is_empty() {
            "none".to_string()
        } else {
            self.sequence.join(" → ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_text() {
        let mut trigger = TriggerSection::default();
        assert_eq!(trigger.sequence_text(), "none");
        trigger.sequence = vec!["/ -> /transactions".into(), "GET /api/tx".into()];
        assert_eq!(trigger.sequence_text(), "/ -> /transactions → GET /api/tx");
    }

    #[test]
    fn test_api_failure_label() {
        let failure = ApiFailure {
            name: "GET /api/transactions".into(),
            method: Some("GET".into()),
            endpoint: Some("/api/transactions".into()),
            status: 500,
            timestamp: 0,
        };
        assert_eq!(failure.label(), "GET /api/transactions -> 500");
    }
}
