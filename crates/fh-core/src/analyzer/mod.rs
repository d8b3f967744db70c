//! Deep error analysis.
//!
//! [`DeepErrorAnalyzer::analyze_error`] snapshots everything known at the
//! moment of a failure into one immutable [`DeepErrorReport`]:
//!
//! 1. Event timeline from the event bus (lookback window plus the latest
//!    state changes, user actions and API calls)
//! 2. Call site parsed from the stack, when it can be parsed
//! 3. Trigger chain derived from the timeline
//! 4. Process-flow chain, active processes and recent history
//! 5. Runtime snapshot from an [`EnvironmentProbe`]
//! 6. Captured console lines and recorded interactions
//!
//! The report is then recorded as one CRITICAL `DEEP_ERROR_ANALYSIS`
//! event. Analysis never fails; missing pieces degrade to empty sections
//! or `Unavailable` capabilities.

pub mod stack;
pub mod trigger;

use std::sync::Arc;

use chrono::Utc;
use fh_common::{Category, CapturedError, Metadata, ReportId, Severity, TelemetryEvent};
use fh_config::AnalyzerConfig;
use fh_report::{
    DeepErrorReport, ErrorSection, FlowSection, ReportMetadata, TimelineSection,
    NO_FLOW_DATA,
};
use fh_telemetry::{EventFilter, TelemetryCore};
use serde_json::json;
use tracing::{error, info_span, warn};

use crate::console::ConsoleBuffer;
use crate::flow::ProcessFlowTracker;
use crate::interaction::InteractionRecorder;
use crate::logging::targets;
use crate::probe::{EnvironmentProbe, HostProbe};

pub use stack::{call_site, origin_frame, parse_frames, StackFrame};
pub use trigger::{api_failure, derive_trigger};

/// Name of the event carrying a finished report.
pub const ANALYSIS_EVENT: &str = "DEEP_ERROR_ANALYSIS";

/// Tag on the analysis event.
pub const ANALYSIS_TAG: &str = "deep-analysis";

/// Interactions copied into a report.
const REPORT_INTERACTIONS: usize = 10;

/// Window sizes for one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerSettings {
    pub lookback_ms: i64,
    pub recent_events: usize,
    pub recent_state_changes: usize,
    pub recent_user_actions: usize,
    pub recent_api_calls: usize,
    pub process_history: usize,
    pub console_lines: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from_config(&AnalyzerConfig::default())
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            lookback_ms: config.lookback_ms,
            recent_events: config.recent_events,
            recent_state_changes: config.recent_state_changes,
            recent_user_actions: config.recent_user_actions,
            recent_api_calls: config.recent_api_calls,
            process_history: config.process_history,
            console_lines: config.console_lines,
        }
    }
}

/// Builds forensic reports from the live telemetry components.
pub struct DeepErrorAnalyzer {
    core: Arc<TelemetryCore>,
    tracker: Arc<ProcessFlowTracker>,
    console: ConsoleBuffer,
    recorder: Option<Arc<InteractionRecorder>>,
    probe: Arc<dyn EnvironmentProbe>,
    settings: AnalyzerSettings,
}

impl std::fmt::Debug for DeepErrorAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepErrorAnalyzer")
            .field("session_id", self.core.session_id())
            .field("settings", &self.settings)
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

impl DeepErrorAnalyzer {
    pub fn new(
        core: Arc<TelemetryCore>,
        tracker: Arc<ProcessFlowTracker>,
        console: ConsoleBuffer,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            core,
            tracker,
            console,
            recorder: None,
            probe: Arc::new(HostProbe::new()),
            settings,
        }
    }

    /// Include recorded interactions in reports.
    pub fn with_recorder(mut self, recorder: Arc<InteractionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn EnvironmentProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Snapshot the failure `error` raised in `context` (usually a component
    /// name) and record it as a CRITICAL event.
    pub fn analyze_error(
        &self,
        error: &CapturedError,
        context: &str,
        additional: Metadata,
    ) -> DeepErrorReport {
        let id = ReportId::new();
        let span = info_span!(target: targets::ANALYZER, "analyze_error", report_id = id.as_str());
        let _guard = span.enter();

        let (timeline, window) = self.timeline();
        let trigger = derive_trigger(&window, &timeline.api_calls, error);
        let client = self.core.context();

        let report = DeepErrorReport {
            id,
            generated_at: Utc::now(),
            error: ErrorSection::from_captured(error),
            call_site: call_site(error, context),
            timeline,
            trigger,
            flow: self.flow_section(),
            runtime: self.probe.snapshot(),
            console: self.console.recent(self.settings.console_lines),
            interactions: self
                .recorder
                .as_ref()
                .map(|r| r.get_recent_interactions(REPORT_INTERACTIONS))
                .unwrap_or_default(),
            metadata: ReportMetadata {
                session_id: self.core.session_id().clone(),
                user_id: self.core.user_id(),
                location: client.location,
                user_agent: client.user_agent,
                platform: self.probe.platform(),
                locale: self.probe.locale(),
                online: client.online,
                additional: self.core.sanitizer().sanitize_metadata(additional),
            },
        };

        let summary = report.summary();
        error!(
            target: targets::ANALYZER,
            report_id = report.id.as_str(),
            component = report.call_site.component.as_deref().unwrap_or("unknown"),
            trigger = report.trigger.direct_cause.as_deref().unwrap_or("none"),
            events = report.timeline.events_in_window,
            "deep error analysis: {}",
            summary
        );
        self.record(&report, summary);
        report
    }

    fn timeline(&self) -> (TimelineSection, Vec<TelemetryEvent>) {
        let settings = &self.settings;
        let since = fh_common::now_millis() - settings.lookback_ms;
        let window: Vec<TelemetryEvent> = self
            .core
            .get_events(&EventFilter::new().since(since))
            .into_iter()
            .filter(|e| e.name != ANALYSIS_EVENT)
            .collect();
        let latest = |category: Category, n: usize| -> Vec<TelemetryEvent> {
            self.core
                .get_events(&EventFilter::new().category(category))
                .into_iter()
                .filter(|e| e.name != ANALYSIS_EVENT)
                .take(n)
                .collect()
        };

        let timeline = TimelineSection {
            window_ms: settings.lookback_ms,
            events_in_window: window.len(),
            recent_events: window.iter().take(settings.recent_events).cloned().collect(),
            state_changes: latest(Category::StateChange, settings.recent_state_changes),
            user_actions: latest(Category::UserAction, settings.recent_user_actions),
            api_calls: latest(Category::ApiCall, settings.recent_api_calls),
        };
        (timeline, window)
    }

    fn flow_section(&self) -> FlowSection {
        let export = self.tracker.export_data();
        let error_chain = self.tracker.get_error_flow_chain();
        let history: Vec<_> = export
            .history
            .into_iter()
            .take(self.settings.process_history)
            .collect();

        let visualization = match error_chain.first() {
            Some(root) => self.tracker.visualize_process_tree(&root.id),
            None if !history.is_empty() => {
                self.tracker.generate_flow_summary(self.settings.process_history)
            }
            None => NO_FLOW_DATA.to_string(),
        };

        FlowSection {
            error_chain,
            active: export.active,
            history,
            visualization,
            stats: export.stats,
        }
    }

    fn record(&self, report: &DeepErrorReport, summary: String) {
        let mut metadata = Metadata::new();
        metadata.insert("report_id".to_string(), json!(report.id.as_str()));
        metadata.insert("summary".to_string(), json!(summary));
        match serde_json::to_value(report) {
            Ok(value) => {
                metadata.insert("report".to_string(), value);
            }
            Err(e) => {
                warn!(target: targets::ANALYZER, error = %e, "report not serializable; event carries summary only")
            }
        }
        self.core.track_with_stack(
            Category::Error,
            ANALYSIS_EVENT,
            metadata,
            vec![ANALYSIS_TAG.to_string()],
            Severity::Critical,
            report.error.stack.clone(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{DomEvent, DomTarget, InteractionSettings};
    use crate::probe::StaticProbe;
    use fh_common::FlowStatus;
    use fh_report::{Capability, RuntimeSnapshot};
    use fh_telemetry::TelemetrySettings;

    fn fixture() -> (Arc<TelemetryCore>, Arc<ProcessFlowTracker>, DeepErrorAnalyzer) {
        let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
        let tracker = Arc::new(ProcessFlowTracker::default());
        let probe = StaticProbe::new(
            RuntimeSnapshot::unavailable("test"),
            "test-platform",
            Capability::Available("en-US".to_string()),
        );
        let analyzer = DeepErrorAnalyzer::new(
            Arc::clone(&core),
            Arc::clone(&tracker),
            ConsoleBuffer::default(),
            AnalyzerSettings::default(),
        )
        .with_probe(Arc::new(probe));
        (core, tracker, analyzer)
    }

    #[test]
    fn test_failed_api_call_is_trigger() {
        let (core, _, analyzer) = fixture();
        core.track_navigation("/", "/transactions", Metadata::new());
        core.track_api_call("GET", "/api/transactions", 500, 120.0, Metadata::new());

        let report = analyzer.analyze_error(
            &CapturedError::message("boom"),
            "TransactionsView",
            Metadata::new(),
        );

        let failure = report.trigger.api_failure.as_ref().unwrap();
        assert_eq!(failure.status, 500);
        assert_eq!(failure.name, "GET /api/transactions");
        assert_eq!(report.timeline.api_calls.len(), 1);
        assert_eq!(report.trigger.direct_cause.as_deref(), Some("GET /api/transactions"));
        assert_eq!(report.call_site.component.as_deref(), Some("TransactionsView"));
        assert_eq!(report.metadata.location, "/transactions");
        assert_eq!(report.metadata.platform, "test-platform");
    }

    #[test]
    fn test_emits_critical_event() {
        let (core, _, analyzer) = fixture();
        let report = analyzer.analyze_error(&CapturedError::message("boom"), "", Metadata::new());

        let events = core.get_events(&EventFilter::new().severity(Severity::Critical));
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.name, ANALYSIS_EVENT);
        assert!(event.has_tag(ANALYSIS_TAG));
        assert_eq!(event.meta_str("report_id"), Some(report.id.as_str()));
        assert_eq!(event.meta_str("summary"), Some("Error: boom"));

        // a second analysis ignores the first one's event
        let second = analyzer.analyze_error(&CapturedError::message("again"), "", Metadata::new());
        assert!(second
            .timeline
            .recent_events
            .iter()
            .all(|e| e.name != ANALYSIS_EVENT));
    }

    #[test]
    fn test_flow_section_placeholder_and_chain() {
        let (_, tracker, analyzer) = fixture();
        let report = analyzer.analyze_error(&CapturedError::message("x"), "", Metadata::new());
        assert_eq!(report.flow.visualization, NO_FLOW_DATA);

        let root = tracker.start_process("page:transactions", Metadata::new(), vec![]);
        let child = tracker.start_process("api:fetchTransactions", Metadata::new(), vec![]);
        tracker.end_process(&child, Some(CapturedError::message("500")));
        tracker.end_process(&root, None);

        let report = analyzer.analyze_error(&CapturedError::message("x"), "", Metadata::new());
        assert_eq!(report.flow.error_chain.len(), 2);
        assert_eq!(report.flow.error_chain[1].status, FlowStatus::Error);
        assert!(report.flow.visualization.contains("api:fetchTransactions"));
        assert_eq!(report.flow.history.len(), 2);
    }

    #[test]
    fn test_flat_summary_without_error_chain() {
        let (_, tracker, analyzer) = fixture();
        let id = tracker.start_process("sync:accounts", Metadata::new(), vec![]);
        tracker.end_process(&id, None);
        let report = analyzer.analyze_error(&CapturedError::message("x"), "", Metadata::new());
        assert!(report.flow.error_chain.is_empty());
        assert!(report.flow.visualization.contains("sync:accounts"));
    }

    #[test]
    fn test_interactions_and_additional_metadata() {
        let (core, tracker, _) = fixture();
        let recorder = Arc::new(InteractionRecorder::new(
            Arc::clone(&core),
            InteractionSettings::default(),
        ));
        recorder.start();
        recorder.handle(DomEvent::click(DomTarget::new("button").with_id("save"), 1.0, 2.0));

        let analyzer = DeepErrorAnalyzer::new(
            Arc::clone(&core),
            tracker,
            ConsoleBuffer::default(),
            AnalyzerSettings::default(),
        )
        .with_recorder(recorder);
        let mut extra = Metadata::new();
        extra.insert("account_id".into(), json!("acc-1"));

        let report = analyzer.analyze_error(&CapturedError::message("x"), "", extra);
        assert_eq!(report.interactions.len(), 1);
        assert_eq!(report.metadata.additional["account_id"], json!("acc-1"));
        assert_eq!(report.metadata.session_id, *core.session_id());
    }
}
