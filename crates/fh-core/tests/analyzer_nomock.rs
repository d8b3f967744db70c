//! No-mock integration tests for deep error analysis.
//!
//! Covers:
//! - Failed API call surfacing as the trigger
//! - Console lines captured through a real tracing registry
//! - Report rendering and file delivery for an analyzed error
//! - Rust backtraces as error stacks

use std::sync::Arc;

use fh_common::{CapturedError, Metadata};
use fh_core::analyzer::{AnalyzerSettings, DeepErrorAnalyzer, ANALYSIS_EVENT};
use fh_core::console::ConsoleBuffer;
use fh_core::flow::ProcessFlowTracker;
use fh_core::probe::StaticProbe;
use fh_report::{
    download_as_markdown, generate_llm_report, generate_quick_report, Capability, ConsoleLevel,
    RuntimeSnapshot,
};
use fh_telemetry::{TelemetryCore, TelemetrySettings};
use serde_json::json;
use tempfile::tempdir;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;

struct Fixture {
    core: Arc<TelemetryCore>,
    tracker: Arc<ProcessFlowTracker>,
    console: ConsoleBuffer,
    analyzer: DeepErrorAnalyzer,
}

fn fixture() -> Fixture {
    let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
    let tracker = Arc::new(ProcessFlowTracker::default());
    let console = ConsoleBuffer::default();
    let probe = StaticProbe::new(
        RuntimeSnapshot::unavailable("headless test"),
        "linux-x86_64",
        Capability::unavailable("LANG not set"),
    );
    let analyzer = DeepErrorAnalyzer::new(
        Arc::clone(&core),
        Arc::clone(&tracker),
        console.clone(),
        AnalyzerSettings::default(),
    )
    .with_probe(Arc::new(probe));
    Fixture {
        core,
        tracker,
        console,
        analyzer,
    }
}

#[test]
fn failed_api_call_becomes_trigger() {
    let fx = fixture();
    fx.core.track_navigation("/", "/transactions", Metadata::new());
    let call = fx
        .core
        .track_api_call("GET", "/api/transactions", 500, 95.0, Metadata::new());

    let report = fx.analyzer.analyze_error(
        &CapturedError::message("boom"),
        "TransactionsView",
        Metadata::new(),
    );

    let failure = report.trigger.api_failure.as_ref().unwrap();
    assert_eq!(failure.status, 500);
    assert_eq!(failure.endpoint.as_deref(), Some("/api/transactions"));
    assert!(report.timeline.api_calls.iter().any(|e| e.id == call.id));
    assert_eq!(
        report.trigger.sequence.last().map(String::as_str),
        Some("GET /api/transactions")
    );
    assert!(!report.runtime.memory.is_available());
}

#[test]
fn successful_calls_are_not_failures() {
    let fx = fixture();
    fx.core
        .track_api_call("GET", "/api/accounts", 200, 40.0, Metadata::new());
    fx.core
        .track_api_call("POST", "/api/budgets", 201, 60.0, Metadata::new());

    let report = fx
        .analyzer
        .analyze_error(&CapturedError::message("boom"), "", Metadata::new());
    assert!(report.trigger.api_failure.is_none());
    assert_eq!(report.timeline.api_calls.len(), 2);
}

#[test]
fn api_call_slice_keeps_latest_five() {
    let fx = fixture();
    for i in 0..8 {
        fx.core
            .track_api_call("GET", &format!("/api/page/{i}"), 200, 10.0, Metadata::new());
    }
    let report = fx
        .analyzer
        .analyze_error(&CapturedError::message("boom"), "", Metadata::new());
    let names: Vec<&str> = report
        .timeline
        .api_calls
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names.len(), 5);
    assert_eq!(names[0], "GET /api/page/7");
    assert_eq!(names[4], "GET /api/page/3");
}

#[test]
fn console_lines_come_from_tracing() {
    let fx = fixture();
    let subscriber = tracing_subscriber::registry()
        .with(fx.console.layer().with_filter(LevelFilter::INFO));

    let report = tracing::subscriber::with_default(subscriber, || {
        tracing::info!(target: "financehub::sync", accounts = 3, "sync started");
        tracing::debug!(target: "financehub::sync", "not captured");
        tracing::warn!(target: "financehub::ledger", "balance mismatch");
        fx.analyzer
            .analyze_error(&CapturedError::message("boom"), "LedgerView", Metadata::new())
    });

    assert_eq!(report.console.len(), 2);
    assert_eq!(report.console[0].level, ConsoleLevel::Log);
    assert_eq!(report.console[0].message, "sync started accounts=3");
    assert_eq!(report.console[1].level, ConsoleLevel::Warn);
    assert_eq!(report.console[1].target, "financehub::ledger");

    // the analyzer's own summary line lands after the snapshot
    let recent = fx.console.recent(10);
    assert!(recent[2..]
        .iter()
        .any(|l| l.level == ConsoleLevel::Error && l.message.starts_with("deep error analysis")));
}

#[test]
fn analysis_event_carries_report() {
    let fx = fixture();
    let report = fx
        .analyzer
        .analyze_error(&CapturedError::message("boom"), "", Metadata::new());

    let event = fx
        .core
        .events()
        .into_iter()
        .find(|e| e.name == ANALYSIS_EVENT)
        .unwrap();
    assert_eq!(event.meta("report").and_then(|r| r.get("id")), Some(&json!(report.id)));
}

#[test]
fn rendered_report_and_saved_file() {
    let fx = fixture();
    let root = fx
        .tracker
        .start_process("page:transactions", Metadata::new(), vec![]);
    let child = fx
        .tracker
        .start_process("api:fetchTransactions", Metadata::new(), vec![]);
    fx.tracker
        .end_process(&child, Some(CapturedError::new("HttpError", "503")));
    fx.tracker.end_process(&root, None);

    let error = CapturedError::new("TypeError", "Cannot read properties of undefined")
        .with_stack(
            "TypeError: Cannot read properties of undefined\n    at TransactionsTable.renderRow (http://localhost:5173/src/TransactionsTable.tsx:88:41)",
        );
    let report = fx
        .analyzer
        .analyze_error(&error, "TransactionsView", Metadata::new());

    let markdown = generate_llm_report(&report);
    assert!(markdown.contains("TypeError"));
    assert!(markdown.contains("TransactionsView"));
    assert!(markdown.contains("api:fetchTransactions"));
    assert_eq!(markdown, generate_llm_report(&report));

    let quick = generate_quick_report(&report);
    assert!(quick.contains("/src/TransactionsTable.tsx:88"));

    let dir = tempdir().unwrap();
    let path = download_as_markdown(&report, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), report.file_name());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), markdown);
}

#[test]
fn rust_backtrace_locates_origin() {
    let fx = fixture();
    let stack = "   0: fh_common::captured::CapturedError::with_backtrace
             at ./crates/fh-common/src/captured.rs:74:18
   1: budget::rollover::apply
             at ./src/rollover.rs:31:14
   2: main
             at ./src/main.rs:9:5";
    let error = CapturedError::new("RolloverError", "negative carry-over").with_stack(stack);
    let report = fx.analyzer.analyze_error(&error, "", Metadata::new());

    assert_eq!(report.call_site.function.as_deref(), Some("budget::rollover::apply"));
    assert_eq!(report.call_site.file.as_deref(), Some("./src/rollover.rs"));
    assert_eq!(report.call_site.line, Some(31));
    assert_eq!(report.call_site.component.as_deref(), Some("rollover"));
}
