//! Passive interaction recording.
//!
//! Raw [`DomEvent`]s become [`InteractionEvent`]s in a bounded ring
//! (newest first) and a sanitized `USER_ACTION` on the event bus. Input
//! values are reduced to length descriptors before anything is stored.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::DateTime;
use fh_common::{
    now_millis, InteractionEvent, InteractionId, InteractionKind, Metadata, Position,
    TargetDescriptor,
};
use fh_config::InteractionsConfig;
use fh_redact::{describe_input, describe_key, truncate_text};
use fh_telemetry::TelemetryCore;
use serde_json::json;
use tracing::{debug, info};

use crate::logging::targets;

use super::dom::{DomEvent, DomTarget};

/// Recorder tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSettings {
    pub capacity: usize,
    pub scroll_debounce_ms: i64,
    pub max_input_len: usize,
    pub max_text_len: usize,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self::from_config(&InteractionsConfig::default())
    }
}

impl InteractionSettings {
    pub fn from_config(config: &InteractionsConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            scroll_debounce_ms: i64::try_from(config.scroll_debounce_ms).unwrap_or(i64::MAX),
            max_input_len: config.max_input_len,
            max_text_len: config.max_text_len,
        }
    }
}

/// Latest scroll of a burst that has not settled yet.
#[derive(Debug, Clone)]
struct PendingScroll {
    position: Option<Position>,
    target: DomTarget,
    last_at: i64,
}

#[derive(Debug, Default)]
struct RecorderState {
    capturing: bool,
    buffer: VecDeque<InteractionEvent>,
    pending_scroll: Option<PendingScroll>,
    /// Last seen input length per element selector, limited to selectors
    /// still present in `buffer`.
    input_lengths: HashMap<String, usize>,
}

/// Ring-buffered recorder of user interactions.
#[derive(Debug)]
pub struct InteractionRecorder {
    core: Arc<TelemetryCore>,
    settings: InteractionSettings,
    state: Mutex<RecorderState>,
}

impl InteractionRecorder {
    /// Create a stopped recorder forwarding to `core`.
    pub fn new(core: Arc<TelemetryCore>, settings: InteractionSettings) -> Self {
        Self {
            core,
            settings,
            state: Mutex::new(RecorderState::default()),
        }
    }

    pub fn settings(&self) -> &InteractionSettings {
        &self.settings
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn start(&self) {
        let mut state = self.lock();
        if !state.capturing {
            state.capturing = true;
            info!(target: targets::INTERACTION, "interaction recording started");
        }
    }

    /// Stop capturing. A scroll burst that has not settled is dropped.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.capturing {
            state.capturing = false;
            state.pending_scroll = None;
            info!(target: targets::INTERACTION, "interaction recording stopped");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.lock().capturing
    }

    /// Feed one raw event observed now.
    pub fn handle(&self, event: DomEvent) -> Option<InteractionEvent> {
        self.handle_at(event, now_millis())
    }

    /// Feed one raw event observed at `now` (epoch ms).
    ///
    /// Returns the record built for this event. Scrolls are deferred until
    /// the burst settles and return `None`.
    pub fn handle_at(&self, event: DomEvent, now: i64) -> Option<InteractionEvent> {
        let mut forwards = Vec::new();
        let recorded = {
            let mut state = self.lock();
            if !state.capturing {
                return None;
            }
            if let Some(settled) = self.settle_scroll(&mut state, now) {
                forwards.push(settled);
            }
            if event.kind == InteractionKind::Scroll {
                state.pending_scroll = Some(PendingScroll {
                    position: event.position,
                    target: event.target,
                    last_at: now,
                });
                None
            } else {
                let recorded = self.record(&mut state, event, now);
                forwards.push(recorded.clone());
                Some(recorded.0)
            }
        };
        for (interaction, metadata) in forwards {
            self.forward(&interaction, metadata);
        }
        recorded
    }

    /// Record the pending scroll if its burst has settled by `now`.
    pub fn flush_pending(&self, now: i64) -> Option<InteractionEvent> {
        let settled = {
            let mut state = self.lock();
            self.settle_scroll(&mut state, now)
        };
        settled.map(|(interaction, metadata)| {
            self.forward(&interaction, metadata);
            interaction
        })
    }

    fn settle_scroll(
        &self,
        state: &mut RecorderState,
        now: i64,
    ) -> Option<(InteractionEvent, Metadata)> {
        let pending = state.pending_scroll.as_ref()?;
        if now - pending.last_at < self.settings.scroll_debounce_ms {
            return None;
        }
        let pending = state.pending_scroll.take()?;
        let mut event = DomEvent::new(InteractionKind::Scroll, pending.target);
        event.position = pending.position;
        Some(self.record(state, event, pending.last_at + self.settings.scroll_debounce_ms))
    }

    /// Build the sanitized record and its forwarded metadata, and store it.
    fn record(
        &self,
        state: &mut RecorderState,
        event: DomEvent,
        timestamp: i64,
    ) -> (InteractionEvent, Metadata) {
        let DomEvent {
            kind,
            target,
            position,
            key,
            value,
        } = event;
        let target = self.describe_target(target);
        let selector = target.selector();

        let mut metadata = Metadata::new();
        metadata.insert("kind".to_string(), json!(kind.as_str()));
        metadata.insert("target".to_string(), json!(selector));
        if let Some(text) = &target.text_content {
            metadata.insert("text".to_string(), json!(text));
        }
        if let Some(position) = position {
            metadata.insert("x".to_string(), json!(position.x));
            metadata.insert("y".to_string(), json!(position.y));
        }

        let key = key.map(|k| describe_key(&k));
        if let Some(key) = &key {
            metadata.insert("key".to_string(), json!(key));
        }

        let input_value = match (kind, value) {
            (InteractionKind::Input | InteractionKind::Change, Some(value)) => {
                let chars = value.chars().count();
                metadata.insert("chars".to_string(), json!(chars));
                if kind == InteractionKind::Input {
                    let previous = state.input_lengths.insert(selector.clone(), chars);
                    let delta = chars as i64 - previous.unwrap_or(0) as i64;
                    metadata.insert("length_delta".to_string(), json!(delta));
                }
                Some(describe_input(&value, self.settings.max_input_len))
            }
            _ => None,
        };

        let interaction = InteractionEvent {
            id: InteractionId::new(),
            timestamp,
            kind,
            target,
            position,
            key,
            input_value,
        };
        metadata.insert("interaction_id".to_string(), json!(interaction.id));

        state.buffer.push_front(interaction.clone());
        if state.buffer.len() > self.settings.capacity {
            state.buffer.truncate(self.settings.capacity);
            let live: HashSet<String> = state.buffer.iter().map(|e| e.target.selector()).collect();
            state.input_lengths.retain(|selector, _| live.contains(selector));
        }
        debug!(
            target: targets::INTERACTION,
            kind = %kind,
            target_selector = %selector,
            "interaction recorded"
        );
        (interaction, metadata)
    }

    fn describe_target(&self, target: DomTarget) -> TargetDescriptor {
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        TargetDescriptor {
            tag_name: target.tag_name.to_ascii_lowercase(),
            id: non_empty(target.id),
            class_name: non_empty(target.class_name),
            name: non_empty(target.name),
            input_type: non_empty(target.input_type),
            placeholder: target
                .placeholder
                .and_then(|p| truncate_text(&p, self.settings.max_text_len)),
            text_content: target
                .text_content
                .and_then(|t| truncate_text(&t, self.settings.max_text_len)),
        }
    }

    fn forward(&self, interaction: &InteractionEvent, metadata: Metadata) {
        let action = format!("{}:{}", interaction.kind, interaction.target.selector());
        self.core.track_user_action(&action, metadata);
    }

    /// Up to `n` most recent interactions, newest first.
    pub fn get_recent_interactions(&self, n: usize) -> Vec<InteractionEvent> {
        self.lock().buffer.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numbered text listing of the `n` most recent interactions.
    pub fn generate_interaction_summary(&self, n: usize) -> String {
        let recent = self.get_recent_interactions(n);
        if recent.is_empty() {
            return "No interactions recorded".to_string();
        }
        let mut out = format!("Recent interactions ({}):", recent.len());
        for (i, interaction) in recent.iter().enumerate() {
            out.push('\n');
            out.push_str(&format!("{}. {}", i + 1, summary_line(interaction)));
        }
        out
    }

    /// Drop recorded interactions and any pending scroll.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.buffer.clear();
        state.pending_scroll = None;
        state.input_lengths.clear();
    }
}

fn summary_line(interaction: &InteractionEvent) -> String {
    let time = DateTime::from_timestamp_millis(interaction.timestamp)
        .map(|t| t.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| interaction.timestamp.to_string());
    let mut line = format!(
        "{} {} {}",
        time,
        interaction.kind,
        interaction.target.selector()
    );
    if let Some(text) = &interaction.target.text_content {
        line.push_str(&format!(" \"{}\"", text));
    }
    if let Some(value) = &interaction.input_value {
        line.push_str(&format!(" {}", value));
    }
    if let Some(key) = &interaction.key {
        line.push_str(&format!(" key={}", key));
    }
    if let Some(position) = interaction.position {
        line.push_str(&format!(" @({:.0},{:.0})", position.x, position.y));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use fh_common::Category;
    use fh_redact::VALUE_TOO_LONG;
    use fh_telemetry::{EventFilter, TelemetrySettings};

    fn recorder() -> (Arc<TelemetryCore>, InteractionRecorder) {
        let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
        let recorder = InteractionRecorder::new(core.clone(), InteractionSettings::default());
        recorder.start();
        (core, recorder)
    }

    fn amount_field() -> DomTarget {
        DomTarget::new("INPUT").with_name("amount").with_type("text")
    }

    #[test]
    fn test_input_lengths_follow_ring_eviction() {
        let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
        let settings = InteractionSettings {
            capacity: 4,
            ..InteractionSettings::default()
        };
        let recorder = InteractionRecorder::new(core.clone(), settings);
        recorder.start();

        for i in 0..50 {
            let field = DomTarget::new("input").with_name(&format!("memo-{i}"));
            recorder.handle(DomEvent::input(field, "abc"));
        }
        assert!(recorder.lock().input_lengths.len() <= 4);

        // an evicted field starts over from zero
        recorder.handle(DomEvent::input(
            DomTarget::new("input").with_name("memo-0"),
            "abcd",
        ));
        let actions = core.get_events(&EventFilter::new().category(Category::UserAction));
        assert_eq!(actions[0].meta("length_delta"), Some(&serde_json::json!(4)));

        // a field still in the ring keeps its baseline
        recorder.handle(DomEvent::input(
            DomTarget::new("input").with_name("memo-49"),
            "abcde",
        ));
        let actions = core.get_events(&EventFilter::new().category(Category::UserAction));
        assert_eq!(actions[0].meta("length_delta"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_stopped_recorder_ignores_events() {
        let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
        let recorder = InteractionRecorder::new(core, InteractionSettings::default());
        assert!(!recorder.is_recording());
        assert!(recorder
            .handle(DomEvent::click(DomTarget::new("button"), 1.0, 2.0))
            .is_none());
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_click_recorded_and_forwarded() {
        let (core, recorder) = recorder();
        let target = DomTarget::new("BUTTON")
            .with_id("refresh")
            .with_class("btn btn-primary")
            .with_text("  Refresh \n transactions ");
        let recorded = recorder.handle(DomEvent::click(target, 10.0, 20.0)).unwrap();
        assert_eq!(recorded.kind, InteractionKind::Click);
        assert_eq!(recorded.target.tag_name, "button");
        assert_eq!(recorded.target.text_content.as_deref(), Some("Refresh transactions"));
        assert_eq!(recorded.position, Some(Position { x: 10.0, y: 20.0 }));

        let actions = core.get_events(&EventFilter::new().category(Category::UserAction));
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "click:button#refresh.btn");
        assert_eq!(actions[0].meta_str("target"), Some("button#refresh.btn"));
        assert_eq!(actions[0].meta_str("interaction_id"), Some(recorded.id.as_str()));
    }

    #[test]
    fn test_long_input_uses_placeholder() {
        let (core, recorder) = recorder();
        let secret = "x".repeat(150);
        let recorded = recorder.handle(DomEvent::input(amount_field(), &secret)).unwrap();
        assert_eq!(recorded.input_value.as_deref(), Some(VALUE_TOO_LONG));

        let exported = core.export_events();
        assert!(!exported.contains(&secret));
        let stored = serde_json::to_string(&recorder.get_recent_interactions(1)).unwrap();
        assert!(!stored.contains(&secret));
    }

    #[test]
    fn test_input_forwards_count_and_delta_only() {
        let (core, recorder) = recorder();
        recorder.handle(DomEvent::input(amount_field(), "12"));
        let recorded = recorder.handle(DomEvent::input(amount_field(), "12.50")).unwrap();
        assert_eq!(recorded.input_value.as_deref(), Some("[5 chars]"));

        let actions = core.get_events(&EventFilter::new().category(Category::UserAction));
        assert_eq!(actions[0].meta_u64("chars"), Some(5));
        assert_eq!(actions[0].meta("length_delta"), Some(&json!(3)));
        assert_eq!(actions[1].meta("length_delta"), Some(&json!(2)));
        assert!(!core.export_events().contains("12.50"));
    }

    #[test]
    fn test_keydown_masks_printable() {
        let (_core, recorder) = recorder();
        let a = recorder.handle(DomEvent::keydown(amount_field(), "7")).unwrap();
        let enter = recorder.handle(DomEvent::keydown(amount_field(), "Enter")).unwrap();
        assert_eq!(a.key.as_deref(), Some("[char]"));
        assert_eq!(enter.key.as_deref(), Some("Enter"));
    }

    #[test]
    fn test_scroll_debounced() {
        let (core, recorder) = recorder();
        let t0 = 1_000_000;
        assert!(recorder.handle_at(DomEvent::scroll(0.0, 100.0), t0).is_none());
        assert!(recorder.handle_at(DomEvent::scroll(0.0, 200.0), t0 + 50).is_none());
        assert!(recorder.handle_at(DomEvent::scroll(0.0, 300.0), t0 + 120).is_none());
        // Burst still settling.
        assert!(recorder.flush_pending(t0 + 250).is_none());
        let settled = recorder.flush_pending(t0 + 320).unwrap();
        assert_eq!(settled.kind, InteractionKind::Scroll);
        assert_eq!(settled.position, Some(Position { x: 0.0, y: 300.0 }));
        assert_eq!(settled.timestamp, t0 + 320);
        assert!(recorder.flush_pending(t0 + 1_000).is_none());

        let scrolls: Vec<_> = recorder
            .get_recent_interactions(10)
            .into_iter()
            .filter(|i| i.kind == InteractionKind::Scroll)
            .collect();
        assert_eq!(scrolls.len(), 1);
        let actions = core.get_events(&EventFilter::new().category(Category::UserAction));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_next_event_settles_scroll_first() {
        let (_core, recorder) = recorder();
        recorder.handle_at(DomEvent::scroll(0.0, 50.0), 0);
        recorder.handle_at(DomEvent::click(DomTarget::new("a"), 1.0, 1.0), 500);
        let recent = recorder.get_recent_interactions(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].kind, InteractionKind::Click);
        assert_eq!(recent[1].kind, InteractionKind::Scroll);
    }

    #[test]
    fn test_stop_drops_pending_scroll() {
        let (_core, recorder) = recorder();
        recorder.handle_at(DomEvent::scroll(0.0, 50.0), 0);
        recorder.stop();
        recorder.start();
        assert!(recorder.flush_pending(10_000).is_none());
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_ring_capacity_newest_first() {
        let core = Arc::new(TelemetryCore::new(TelemetrySettings::default()));
        let recorder = InteractionRecorder::new(
            core,
            InteractionSettings {
                capacity: 3,
                ..InteractionSettings::default()
            },
        );
        recorder.start();
        for i in 0..5 {
            recorder.handle(DomEvent::focus(DomTarget::new("input").with_id(&format!("f{}", i))));
        }
        let ids: Vec<String> = recorder
            .get_recent_interactions(10)
            .into_iter()
            .filter_map(|i| i.target.id)
            .collect();
        assert_eq!(ids, vec!["f4", "f3", "f2"]);
        assert_eq!(recorder.get_recent_interactions(2).len(), 2);
    }

    #[test]
    fn test_summary() {
        let (_core, recorder) = recorder();
        assert_eq!(recorder.generate_interaction_summary(5), "No interactions recorded");
        recorder.handle_at(
            DomEvent::click(DomTarget::new("button").with_id("save").with_text("Save"), 4.0, 8.0),
            0,
        );
        recorder.handle_at(DomEvent::input(amount_field(), "100"), 1_500);
        let summary = recorder.generate_interaction_summary(5);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Recent interactions (2):");
        assert_eq!(lines[1], "1. 00:00:01.500 input input[name=amount] [3 chars]");
        assert_eq!(lines[2], "2. 00:00:00.000 click button#save \"Save\" @(4,8)");
    }

    #[test]
    fn test_clear() {
        let (_core, recorder) = recorder();
        recorder.handle(DomEvent::submit(DomTarget::new("form").with_id("tx")));
        recorder.clear();
        assert!(recorder.is_empty());
    }
}
