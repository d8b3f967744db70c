//! No-mock integration tests for the assembled runtime.
//!
//! Covers:
//! - Critical events persisted to a real directory
//! - JSONL logs correlated with the report id
//! - Export of a full scripted session

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use fh_common::{Category, Severity};
use fh_config::TelemetryConfig;
use fh_core::analyzer::ANALYSIS_EVENT;
use fh_core::console::ConsoleBuffer;
use fh_core::logging::{targets, JsonlLayer};
use fh_core::runtime::TelemetryRuntime;
use fh_core::scenario::{run_demo_session, DEMO_COMPONENT};
use fh_telemetry::{CriticalEventStore, EventFilter, FileEventStore};
use tempfile::tempdir;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn config_in(dir: &std::path::Path) -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.storage.enabled = true;
    config.storage.dir = Some(dir.to_path_buf());
    config
}

#[test]
fn demo_session_persists_critical_analysis() {
    let dir = tempdir().unwrap();
    let rt = TelemetryRuntime::new(config_in(dir.path()), ConsoleBuffer::default());
    rt.start();
    let report = run_demo_session(&rt);
    rt.shutdown();

    let stored = FileEventStore::new(dir.path()).load_all().unwrap();
    assert!(!stored.is_empty());
    assert!(stored.iter().all(|e| e.severity.is_error()));
    let analysis = stored.iter().find(|e| e.name == ANALYSIS_EVENT).unwrap();
    assert_eq!(analysis.severity, Severity::Critical);
    assert_eq!(
        analysis.meta("report_id").and_then(|v| v.as_str()),
        Some(report.id.as_str())
    );
    assert!(stored
        .iter()
        .any(|e| e.category == Category::ApiCall && e.meta_u64("status") == Some(500)));
}

#[test]
fn analyzer_log_carries_report_id() {
    let buf = SharedBuf::default();
    let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buf.clone()));

    let report = tracing::subscriber::with_default(subscriber, || {
        let mut config = TelemetryConfig::default();
        config.storage.enabled = false;
        let rt = TelemetryRuntime::new(config, ConsoleBuffer::default());
        rt.start();
        let report = run_demo_session(&rt);
        rt.shutdown();
        report
    });

    let output = buf.0.lock().unwrap();
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let analysis = lines
        .iter()
        .find(|l| l["event"] == targets::ANALYZER && l["level"] == "error")
        .unwrap();
    assert_eq!(analysis["report_id"], report.id.as_str());
    assert_eq!(analysis["fields"]["component"], DEMO_COMPONENT);
    assert!(analysis["message"]
        .as_str()
        .unwrap()
        .starts_with("deep error analysis"));

    assert!(lines.iter().any(|l| l["event"] == targets::RUNTIME
        && l["message"] == "telemetry runtime stopped"));
}

#[test]
fn export_covers_events_and_flows() {
    let dir = tempdir().unwrap();
    let rt = TelemetryRuntime::new(config_in(dir.path()), ConsoleBuffer::default());
    rt.start();
    run_demo_session(&rt);

    let events = rt.core().export();
    let flows = rt.tracker().export_data();
    let doc = serde_json::json!({ "events": events, "flows": flows });

    assert!(doc["events"]["events"].as_array().unwrap().len() >= 8);
    assert_eq!(flows.stats.errors, 3);
    assert_eq!(flows.active.len(), 0);

    let actions = rt
        .core()
        .get_events(&EventFilter::new().category(Category::UserAction));
    assert_eq!(actions.len(), 3);
    rt.shutdown();
}
