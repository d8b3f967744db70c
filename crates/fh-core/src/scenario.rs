//! Scripted demo session.
//!
//! Drives every component the way the FinanceHub front end would while a
//! user opens the transactions view and the ledger fails to load, then
//! analyzes the resulting render error.

use fh_common::{CapturedError, Metadata};
use fh_report::DeepErrorReport;
use serde_json::json;

use crate::interaction::{DomEvent, DomTarget};
use crate::runtime::TelemetryRuntime;

/// Component the demo error is attributed to.
pub const DEMO_COMPONENT: &str = "TransactionsView";

/// Stack of the demo render error, as relayed by the web front end.
pub const DEMO_STACK: &str = "TypeError: Cannot read properties of undefined (reading 'amount')
    at TransactionsTable.renderRow (http://localhost:5173/src/components/TransactionsTable.tsx:88:41)
    at Array.map (<anonymous>)
    at TransactionsTable.render (http://localhost:5173/src/components/TransactionsTable.tsx:61:22)
    at TransactionsView (http://localhost:5173/src/views/TransactionsView.tsx:34:7)";

fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Play the scripted session against `rt` and return the forensic report.
///
/// The runtime is expected to be started; interactions are dropped
/// otherwise.
pub fn run_demo_session(rt: &TelemetryRuntime) -> DeepErrorReport {
    let core = rt.core();
    let tracker = rt.tracker();
    let recorder = rt.recorder();

    for asset in [
        "/assets/index.js",
        "/assets/vendor.js",
        "/assets/index.css",
        "/assets/logo.svg",
        "/assets/inter.woff2",
    ] {
        rt.probe().record_resource(asset);
    }

    core.set_user_id(Some("user-4821".to_string()));
    recorder.handle(DomEvent::click(
        DomTarget::new("a")
            .with_class("nav-link")
            .with_text("Transactions"),
        112.0,
        24.0,
    ));
    core.track_navigation("/", "/transactions", Metadata::new());

    let page = tracker.start_process(
        "page:transactions",
        meta(&[("route", json!("/transactions"))]),
        vec!["page".to_string()],
    );

    let fetch = tracker.start_process(
        "api:fetchTransactions",
        meta(&[("endpoint", json!("/api/transactions"))]),
        vec!["api".to_string()],
    );
    core.start_performance("fetchTransactions", Metadata::new());
    core.end_performance("fetchTransactions", Metadata::new());
    core.track_api_call(
        "GET",
        "/api/transactions",
        500,
        184.0,
        meta(&[("request_id", json!("req-7f3a"))]),
    );
    tracker.end_process(
        &fetch,
        Some(CapturedError::new(
            "HttpError",
            "GET /api/transactions returned 500",
        )),
    );

    core.track_state_change(
        "transactions",
        &json!({ "status": "loading", "items": [] }),
        &json!({ "status": "error", "items": null }),
    );

    recorder.handle(DomEvent::focus(
        DomTarget::new("input")
            .with_name("search")
            .with_type("text")
            .with_placeholder("Search transactions"),
    ));
    recorder.handle(DomEvent::input(
        DomTarget::new("input")
            .with_name("search")
            .with_type("text")
            .with_placeholder("Search transactions"),
        "coffee",
    ));

    let error = CapturedError::new(
        "TypeError",
        "Cannot read properties of undefined (reading 'amount')",
    )
    .with_stack(DEMO_STACK);

    let render = tracker.start_process(
        "render:TransactionsTable",
        Metadata::new(),
        vec!["render".to_string()],
    );
    tracker.end_process(&render, Some(error.clone()));
    core.track_error(&error, meta(&[("component", json!(DEMO_COMPONENT))]));

    let report = rt.analyzer().analyze_error(
        &error,
        DEMO_COMPONENT,
        meta(&[("feature", json!("transactions")), ("build", json!("demo"))]),
    );
    tracker.end_process(&page, Some(error));
    report
}
