//! Trigger derivation over the event timeline.

use fh_common::{Category, CapturedError, TelemetryEvent};
use fh_redact::scrub_secrets;
use fh_report::{ApiFailure, TriggerSection};

/// Events shown in the trigger sequence.
pub const SEQUENCE_LEN: usize = 5;

/// Failed API call (status >= 400) described by `event`, if it is one.
pub fn api_failure(event: &TelemetryEvent) -> Option<ApiFailure> {
    if event.category != Category::ApiCall {
        return None;
    }
    let status = event.meta_u64("status")?;
    if status < 400 {
        return None;
    }
    Some(ApiFailure {
        name: event.name.clone(),
        method: event.meta_str("method").map(str::to_string),
        endpoint: event.meta_str("endpoint").map(str::to_string),
        status: u16::try_from(status).unwrap_or(u16::MAX),
        timestamp: event.timestamp,
    })
}

/// Whether `event` is the ERROR event recording `error` itself.
pub fn records_error(event: &TelemetryEvent, error: &CapturedError) -> bool {
    event.category == Category::Error
        && event.meta_str("error_name") == Some(error.name.as_str())
        && event.meta_str("message") == Some(&*scrub_secrets(&error.message))
}

/// Derive the trigger chain from `window` (newest first).
///
/// `api_calls` is searched for the failure separately, so a failed call
/// older than the window still shows up.
pub fn derive_trigger(
    window: &[TelemetryEvent],
    api_calls: &[TelemetryEvent],
    error: &CapturedError,
) -> TriggerSection {
    let latest_of = |category: Category| {
        window
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.name.clone())
    };

    let mut sequence: Vec<String> = window
        .iter()
        .take(SEQUENCE_LEN)
        .map(|e| e.name.clone())
        .collect();
    sequence.reverse();

    TriggerSection {
        direct_cause: window
            .iter()
            .find(|e| !records_error(e, error))
            .map(|e| e.name.clone()),
        user_action: latest_of(Category::UserAction),
        api_failure: window
            .iter()
            .chain(api_calls)
            .find_map(api_failure),
        state_change: latest_of(Category::StateChange),
        sequence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fh_common::{SessionId, Severity};
    use serde_json::json;

    fn event(category: Category, name: &str, ts: i64) -> TelemetryEvent {
        let mut e = TelemetryEvent::new(category, Severity::Info, name, SessionId::new());
        e.timestamp = ts;
        e
    }

    fn api(name: &str, status: u64, ts: i64) -> TelemetryEvent {
        let mut e = event(Category::ApiCall, name, ts);
        e.metadata.insert("status".into(), json!(status));
        e.metadata.insert("method".into(), json!("GET"));
        e.metadata.insert("endpoint".into(), json!("/api/transactions"));
        e
    }

    #[test]
    fn test_api_failure_threshold() {
        assert!(api_failure(&api("GET /a", 399, 1)).is_none());
        let failure = api_failure(&api("GET /a", 500, 1)).unwrap();
        assert_eq!(failure.status, 500);
        assert_eq!(failure.method.as_deref(), Some("GET"));
        assert!(api_failure(&event(Category::Navigation, "/ -> /a", 1)).is_none());
    }

    #[test]
    fn test_derive_trigger() {
        let error = CapturedError::new("TypeError", "boom");
        let mut own = event(Category::Error, "TypeError", 7);
        own.metadata.insert("error_name".into(), json!("TypeError"));
        own.metadata.insert("message".into(), json!("boom"));

        // newest first
        let window = vec![
            own,
            event(Category::StateChange, "transactions", 6),
            event(Category::UserAction, "click:button#save", 5),
            api("GET /api/transactions", 500, 4),
            api("GET /api/accounts", 200, 3),
            event(Category::Navigation, "/ -> /transactions", 2),
        ];
        let trigger = derive_trigger(&window, &[], &error);

        assert_eq!(trigger.direct_cause.as_deref(), Some("transactions"));
        assert_eq!(trigger.user_action.as_deref(), Some("click:button#save"));
        assert_eq!(trigger.state_change.as_deref(), Some("transactions"));
        assert_eq!(trigger.api_failure.unwrap().name, "GET /api/transactions");
        assert_eq!(
            trigger.sequence,
            vec![
                "GET /api/accounts",
                "GET /api/transactions",
                "click:button#save",
                "transactions",
                "TypeError"
            ]
        );
    }

    #[test]
    fn test_failure_outside_window() {
        let error = CapturedError::message("boom");
        let older = vec![api("POST /api/import", 503, 1)];
        let trigger = derive_trigger(&[], &older, &error);
        assert_eq!(trigger.api_failure.unwrap().status, 503);
        assert!(trigger.direct_cause.is_none());
        assert!(trigger.sequence.is_empty());
    }
}
