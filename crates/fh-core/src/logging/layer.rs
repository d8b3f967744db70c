//! JSONL tracing layer.
//!
//! One JSON object per event on stderr (or any writer), keeping stdout
//! free for command payloads. Correlation ids recorded on enclosing spans
//! (`session_id`, `flow_id`, `report_id`) are lifted onto each line, and
//! string values are scrubbed of secrets before they are written.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use fh_redact::scrub_secrets;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record as SpanValues};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Ids a span can carry for downstream correlation.
#[derive(Debug, Clone, Default, Serialize)]
struct Correlation {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_id: Option<String>,
}

impl Correlation {
    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "session_id" => Some(&mut self.session_id),
            "flow_id" => Some(&mut self.flow_id),
            "report_id" => Some(&mut self.report_id),
            _ => None,
        }
    }

    /// Fill ids still missing from `outer`.
    fn inherit(&mut self, outer: &Correlation) {
        for (mine, theirs) in [
            (&mut self.session_id, &outer.session_id),
            (&mut self.flow_id, &outer.flow_id),
            (&mut self.report_id, &outer.report_id),
        ] {
            if mine.is_none() {
                mine.clone_from(theirs);
            }
        }
    }
}

impl Visit for Correlation {
    fn record_str(&mut self, field: &Field, value: &str) {
        if let Some(slot) = self.slot(field.name()) {
            *slot = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if let Some(slot) = self.slot(field.name()) {
            *slot = Some(format!("{:?}", value));
        }
    }
}

/// Event fields split into the message and everything else.
#[derive(Default)]
struct Fields {
    message: Option<String>,
    rest: Map<String, Value>,
}

impl Fields {
    fn put(&mut self, field: &Field, value: Value) {
        self.rest.insert(field.name().to_string(), value);
    }

    fn put_text(&mut self, field: &Field, text: &str) {
        let clean = scrub_secrets(text).into_owned();
        if field.name() == "message" {
            self.message = Some(clean);
        } else {
            self.put(field, Value::String(clean));
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put_text(field, value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put_text(field, &format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }
}

/// One output line.
#[derive(Serialize)]
struct Line<'a> {
    ts: String,
    level: Level,
    /// Log target.
    event: &'a str,
    #[serde(flatten)]
    ids: Correlation,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
}

/// JSONL layer over a writer, stderr by default.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut ids = Correlation::default();
        attrs.record(&mut ids);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(ids);
        }
    }

    fn on_record(&self, id: &Id, values: &SpanValues<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            if let Some(ids) = extensions.get_mut::<Correlation>() {
                values.record(ids);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        // innermost span wins
        let mut ids = Correlation::default();
        for span in ctx.event_scope(event).into_iter().flatten() {
            if let Some(outer) = span.extensions().get::<Correlation>() {
                ids.inherit(outer);
            }
        }

        let mut fields = Fields::default();
        event.record(&mut fields);

        let metadata = event.metadata();
        let line = Line {
            ts: Utc::now().to_rfc3339(),
            level: (*metadata.level()).into(),
            event: metadata.target(),
            ids,
            message: fields.message,
            fields: fields.rest,
        };
        let Ok(json) = serde_json::to_string(&line) else {
            return;
        };
        let mut writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let _ = writeln!(writer, "{}", json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture<F: FnOnce()>(f: F) -> Vec<Value> {
        let sink = Sink::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(sink.clone()));
        tracing::subscriber::with_default(subscriber, f);
        let bytes = sink.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_line_shape() {
        let lines = capture(|| {
            tracing::info!(target: "fh_core::flow", name = "page:budget", depth = 0u64, "process started");
        });
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "info");
        assert_eq!(line["event"], "fh_core::flow");
        assert_eq!(line["message"], "process started");
        assert_eq!(line["fields"]["name"], "page:budget");
        assert_eq!(line["fields"]["depth"], 0);
        assert!(line.get("report_id").is_none());
        assert!(line["ts"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_innermost_span_ids_win() {
        let lines = capture(|| {
            let session = tracing::info_span!("session", session_id = "fh-1", flow_id = "proc-outer");
            let _s = session.enter();
            let flow = tracing::info_span!("flow", flow_id = "proc-inner");
            let _f = flow.enter();
            tracing::warn!(status = 500u64, "api failed");
        });
        assert_eq!(lines[0]["session_id"], "fh-1");
        assert_eq!(lines[0]["flow_id"], "proc-inner");
        assert_eq!(lines[0]["fields"]["status"], 500);
    }

    #[test]
    fn test_ids_recorded_after_span_creation() {
        let lines = capture(|| {
            let span = tracing::info_span!("analyze", report_id = tracing::field::Empty);
            let _g = span.enter();
            span.record("report_id", "rpt-42");
            tracing::error!("deep error analysis");
        });
        assert_eq!(lines[0]["report_id"], "rpt-42");
    }

    #[test]
    fn test_secrets_are_scrubbed() {
        let lines = capture(|| {
            tracing::info!(header = "Bearer abcdefghijklmnopqrstuvwxyz012345", "request sent");
        });
        let header = lines[0]["fields"]["header"].as_str().unwrap();
        assert!(!header.contains("abcdefghijklmnopqrstuvwxyz012345"));
        assert!(header.contains(fh_redact::REDACTED_MARKER));
    }
}
