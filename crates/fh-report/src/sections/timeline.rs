//! Event history leading up to the failure.

use fh_common::TelemetryEvent;
use serde::{Deserialize, Serialize};

/// Recent Event Bus history, newest first in every list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSection {
    /// Lookback window the events were drawn from, in milliseconds.
    pub window_ms: i64,
    /// Total events inside the window.
    pub events_in_window: usize,
    /// Most recent events overall.
    pub recent_events: Vec<TelemetryEvent>,
    pub state_changes: Vec<TelemetryEvent>,
    pub user_actions: Vec<TelemetryEvent>,
    pub api_calls: Vec<TelemetryEvent>,
}

impl TimelineSection {
    pub fn is_empty(&self) -> bool {
        self.recent_events.is_empty()
            && self.state_changes.is_empty()
            && self.user_actions.is_empty()
            && self.api_calls.is_empty()
    }
}
