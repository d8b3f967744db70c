//! No-mock integration tests for the event bus.
//!
//! Covers:
//! - Bounded log ordering under overflow (property-based)
//! - Filter intersection over a realistic session
//! - Subscriber isolation with real callbacks
//! - Timer collisions and measured durations
//! - Self-referencing state values

use fh_common::{CapturedError, Category, Metadata, Severity};
use fh_telemetry::{EventFilter, TelemetryCore, TelemetrySettings};
use proptest::prelude::*;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn core_with_capacity(capacity: usize) -> TelemetryCore {
    TelemetryCore::new(TelemetrySettings {
        capacity,
        ..TelemetrySettings::default()
    })
}

fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn default_log_keeps_most_recent_thousand() {
    let core = TelemetryCore::new(TelemetrySettings::default());
    for i in 0..1200 {
        core.track(
            Category::UserAction,
            format!("action-{i}"),
            Metadata::new(),
            vec![],
            Severity::Info,
        );
    }
    let events = core.events();
    assert_eq!(events.len(), 1000);
    assert_eq!(events[0].name, "action-1199");
    assert_eq!(events[999].name, "action-200");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn bounded_log_is_newest_first_suffix(capacity in 1usize..40, extra in 0usize..60) {
        let core = core_with_capacity(capacity);
        // SESSION_START already occupies one slot.
        let total = capacity + extra;
        for i in 0..total {
            core.track(Category::Render, format!("{i}"), Metadata::new(), vec![], Severity::Debug);
        }
        let events = core.events();
        prop_assert_eq!(events.len(), capacity);
        for (offset, event) in events.iter().enumerate() {
            prop_assert_eq!(event.name.clone(), format!("{}", total - 1 - offset));
        }
    }
}

#[test]
fn filters_intersect_over_session() {
    let core = TelemetryCore::new(TelemetrySettings::default());
    let start = fh_common::now_millis();
    core.track_api_call("GET", "/api/accounts", 200, 15.0, Metadata::new());
    core.track_api_call("POST", "/api/transactions", 500, 230.0, Metadata::new());
    core.track(
        Category::UserAction,
        "save",
        Metadata::new(),
        vec!["form".to_string(), "budget".to_string()],
        Severity::Info,
    );
    core.track_error(&CapturedError::message("render failed"), Metadata::new());

    let api_errors = core.get_events(
        &EventFilter::new()
            .category(Category::ApiCall)
            .severity(Severity::Error),
    );
    assert_eq!(api_errors.len(), 1);
    assert_eq!(api_errors[0].meta_str("endpoint"), Some("/api/transactions"));

    let errors = core.get_events(&EventFilter::new().severity(Severity::Error));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].category, Category::Error);

    let tagged = core.get_events(&EventFilter::new().tag("budget").since(start));
    assert_eq!(tagged.len(), 1);

    let stats = core.get_statistics();
    assert_eq!(stats.total_events, 5);
    assert!((stats.error_rate - 40.0).abs() < 1e-9);
}

#[test]
fn panicking_subscriber_never_blocks_others() {
    let core = TelemetryCore::new(TelemetrySettings::default());
    let received = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));

    let calls_bad = calls.clone();
    let _bad = core.subscribe(move |event| {
        calls_bad.fetch_add(1, Ordering::SeqCst);
        if event.name == "explode" {
            panic!("subscriber failure");
        }
    });
    let sink = received.clone();
    let _good = core.subscribe(move |event| {
        sink.lock().unwrap().push(event.name.clone());
    });

    core.track_user_action("explode", Metadata::new());
    core.track_user_action("after", Metadata::new());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*received.lock().unwrap(), vec!["explode", "after"]);
    let names: Vec<String> = core.events().into_iter().map(|e| e.name).collect();
    assert_eq!(&names[..2], &["after".to_string(), "explode".to_string()]);
}

#[test]
fn same_named_timers_collide() {
    let core = TelemetryCore::new(TelemetrySettings::default());
    core.start_performance("sync", meta(&[("attempt", json!(1))]));
    core.start_performance("sync", meta(&[("attempt", json!(2))]));
    assert!(core.end_performance("sync", Metadata::new()).is_some());
    assert!(core.end_performance("sync", Metadata::new()).is_none());

    let perf = core.get_events(&EventFilter::new().category(Category::Performance));
    assert_eq!(perf.len(), 1);
    assert_eq!(perf[0].meta_u64("attempt"), Some(2));
}

#[test]
fn timed_operation_reports_elapsed_wall_clock() {
    let core = core_with_capacity(100);
    core.start_performance("sync_accounts", Metadata::new());
    let started = Instant::now();
    thread::sleep(Duration::from_millis(100));
    let duration = core
        .end_performance("sync_accounts", Metadata::new())
        .expect("timer was started");
    let wall = started.elapsed().as_secs_f64() * 1000.0;

    assert!(duration >= 100.0, "duration {} shorter than the sleep", duration);
    assert!(duration <= wall + 5.0, "duration {} exceeds wall clock {}", duration, wall);

    let perf = core.get_events(&EventFilter::new().category(Category::Performance));
    assert_eq!(perf.len(), 1);
    assert_eq!(perf[0].name, "sync_accounts_duration");
    assert_eq!(perf[0].duration, Some(duration));
    assert_eq!(perf[0].meta("duration_ms"), Some(&json!(duration)));
    assert_eq!(perf[0].severity, Severity::Info);
}

#[test]
fn circular_state_degrades_to_placeholder() {
    struct Account {
        id: u32,
        parent: Option<Rc<RefCell<Account>>>,
    }

    impl serde::Serialize for Account {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeStruct;
            let mut st = serializer.serialize_struct("Account", 2)?;
            st.serialize_field("id", &self.id)?;
            st.serialize_field("parent", &self.parent.as_deref())?;
            st.end()
        }
    }

    let account = Rc::new(RefCell::new(Account { id: 7, parent: None }));
    account.borrow_mut().parent = Some(Rc::clone(&account));

    let core = TelemetryCore::new(TelemetrySettings::default());
    let event = core.track_state_change("ledger", &json!({"ok": true}), &*account.borrow());
    account.borrow_mut().parent = None;

    let stored = event.meta_str("new_value");
    assert!(
        stored == Some(fh_redact::TOO_LARGE_PLACEHOLDER)
            || stored == Some(fh_redact::UNSERIALIZABLE_PLACEHOLDER),
        "cycle stored as {:?}",
        stored
    );
    assert_eq!(event.meta("old_value"), Some(&json!({"ok": true})));
    assert_eq!(core.event_count(), core.get_events(&EventFilter::new()).len());
}
