//! The event bus.
//!
//! `TelemetryCore` owns the bounded, newest-first event log of one session.
//! All state sits behind short-lived mutexes; subscriber callbacks run after
//! the locks are released, so a subscriber may call back into the core.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use fh_common::{
    CapturedError, Category, Metadata, SessionId, Severity, TelemetryEvent, SCHEMA_VERSION,
};
use fh_config::TelemetryConfig;
use fh_redact::ValueSanitizer;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::{ClientContext, Viewport, Visibility};
use crate::filter::EventFilter;
use crate::hooks;
use crate::perf::PerformanceTimers;
use crate::stats::{TelemetryStatistics, DURATION_SUFFIX};
use crate::store::{CriticalEventStore, FileEventStore};

/// Standard event names emitted by the core itself.
pub mod event_names {
    pub const SESSION_START: &str = "SESSION_START";
    pub const SESSION_END: &str = "SESSION_END";
    pub const VISIBILITY_CHANGE: &str = "VISIBILITY_CHANGE";
    pub const UNCAUGHT_PANIC: &str = "UNCAUGHT_PANIC";
    pub const UNHANDLED_REJECTION: &str = "UNHANDLED_REJECTION";
}

/// Tunables of the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    pub capacity: usize,
    pub slow_operation_ms: f64,
    pub max_metadata_value_len: usize,
    pub max_state_value_len: usize,
    pub max_persisted: usize,
    pub dev_mode: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

impl TelemetrySettings {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self {
            capacity: config.events.capacity,
            slow_operation_ms: config.events.slow_operation_ms,
            max_metadata_value_len: config.events.max_metadata_value_len,
            max_state_value_len: config.sanitize.max_state_value_len,
            max_persisted: config.storage.max_persisted,
            dev_mode: config.events.dev_mode,
        }
    }
}

/// Snapshot produced by [`TelemetryCore::export_events`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventExport {
    pub schema_version: String,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub events: Vec<TelemetryEvent>,
    pub statistics: TelemetryStatistics,
    /// Milliseconds since epoch.
    pub export_timestamp: i64,
}

type Callback = Arc<dyn Fn(&TelemetryEvent) + Send + Sync>;

#[derive(Default)]
struct SubscriberList {
    entries: Vec<(u64, Callback)>,
}

/// Handle returned by [`TelemetryCore::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to stop delivery.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    list: Weak<Mutex<SubscriberList>>,
}

impl Subscription {
    /// Stop delivery to this subscriber. Returns false if the core is gone.
    pub fn unsubscribe(self) -> bool {
        let Some(list) = self.list.upgrade() else {
            return false;
        };
        let mut list = list.lock().unwrap_or_else(|p| p.into_inner());
        let before = list.entries.len();
        list.entries.retain(|(id, _)| *id != self.id);
        before != list.entries.len()
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct CoreState {
    events: VecDeque<TelemetryEvent>,
    timers: PerformanceTimers,
    user_id: Option<String>,
    context: ClientContext,
    ended: bool,
}

/// Everything needed to record one event.
struct EventDraft {
    category: Category,
    severity: Severity,
    name: String,
    metadata: Metadata,
    tags: Vec<String>,
    duration: Option<f64>,
    stack: Option<String>,
}

impl EventDraft {
    fn new(category: Category, severity: Severity, name: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            name: name.into(),
            metadata: Metadata::new(),
            tags: Vec::new(),
            duration: None,
            stack: None,
        }
    }

    fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Session-scoped telemetry event bus.
pub struct TelemetryCore {
    session_id: SessionId,
    settings: TelemetrySettings,
    sanitizer: ValueSanitizer,
    started: Instant,
    state: Mutex<CoreState>,
    subscribers: Arc<Mutex<SubscriberList>>,
    next_subscriber: AtomicU64,
    store: Option<Arc<dyn CriticalEventStore>>,
}

impl std::fmt::Debug for TelemetryCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryCore")
            .field("session_id", &self.session_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TelemetryCore {
    /// Create a core without persistence. Emits `SESSION_START`.
    pub fn new(settings: TelemetrySettings) -> Self {
        Self::build(settings, None)
    }

    /// Create a core persisting critical events to `store`.
    pub fn with_store(settings: TelemetrySettings, store: Arc<dyn CriticalEventStore>) -> Self {
        Self::build(settings, Some(store))
    }

    /// Create a core from configuration, persisting to the configured
    /// directory when storage is enabled.
    pub fn from_config(config: &TelemetryConfig) -> Self {
        let settings = TelemetrySettings::from_config(config);
        let store: Option<Arc<dyn CriticalEventStore>> = if config.storage.enabled {
            match config.storage.resolved_dir() {
                Some(dir) => Some(Arc::new(FileEventStore::new(dir))),
                None => {
                    warn!("no storage directory available; critical events will not be persisted");
                    None
                }
            }
        } else {
            None
        };
        Self::build(settings, store)
    }

    fn build(settings: TelemetrySettings, store: Option<Arc<dyn CriticalEventStore>>) -> Self {
        let core = Self {
            session_id: SessionId::new(),
            sanitizer: ValueSanitizer::new(
                settings.max_state_value_len,
                settings.max_metadata_value_len,
            ),
            settings,
            started: Instant::now(),
            state: Mutex::new(CoreState {
                events: VecDeque::new(),
                timers: PerformanceTimers::default(),
                user_id: None,
                context: ClientContext::default(),
                ended: false,
            }),
            subscribers: Arc::new(Mutex::new(SubscriberList::default())),
            next_subscriber: AtomicU64::new(1),
            store,
        };
        info!(session_id = %core.session_id, "telemetry session started");
        core.record(EventDraft::new(
            Category::Lifecycle,
            Severity::Info,
            event_names::SESSION_START,
        ));
        core
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn settings(&self) -> &TelemetrySettings {
        &self.settings
    }

    pub fn sanitizer(&self) -> &ValueSanitizer {
        &self.sanitizer
    }

    fn lock_state(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    // ---------------------------------------------------------------
    // Recording
    // ---------------------------------------------------------------

    /// Record an event and return the stored copy.
    pub fn track(
        &self,
        category: Category,
        name: impl Into<String>,
        metadata: Metadata,
        tags: Vec<String>,
        severity: Severity,
    ) -> TelemetryEvent {
        let mut draft = EventDraft::new(category, severity, name).metadata(metadata);
        draft.tags = tags;
        self.record(draft)
    }

    /// Like [`track`](Self::track), with the stack of an error-level event
    /// supplied by the caller instead of captured here.
    pub fn track_with_stack(
        &self,
        category: Category,
        name: impl Into<String>,
        metadata: Metadata,
        tags: Vec<String>,
        severity: Severity,
        stack: Option<String>,
    ) -> TelemetryEvent {
        let mut draft = EventDraft::new(category, severity, name).metadata(metadata);
        draft.tags = tags;
        draft.stack = stack;
        self.record(draft)
    }

    fn record(&self, draft: EventDraft) -> TelemetryEvent {
        let EventDraft {
            category,
            severity,
            name,
            metadata,
            tags,
            duration,
            stack,
        } = draft;

        let mut metadata = self.sanitizer.sanitize_metadata(metadata);
        let mut event = TelemetryEvent::new(category, severity, name, self.session_id.clone());
        event.tags = tags;
        event.duration = duration;
        if severity.is_error() {
            event.stack_trace = Some(stack.unwrap_or_else(|| {
                std::backtrace::Backtrace::force_capture().to_string()
            }));
        }

        {
            let mut state = self.lock_state();
            let ctx = &state.context;
            metadata
                .entry("user_agent".to_string())
                .or_insert_with(|| json!(ctx.user_agent));
            if let Some(viewport) = ctx.viewport {
                metadata
                    .entry("viewport".to_string())
                    .or_insert_with(|| json!(viewport));
            }
            metadata
                .entry("location".to_string())
                .or_insert_with(|| json!(ctx.location));
            event.metadata = metadata;
            event.user_id = state.user_id.clone();

            state.events.push_front(event.clone());
            let capacity = self.settings.capacity;
            if state.events.len() > capacity {
                state.events.truncate(capacity);
            }
        }

        self.notify(&event);

        if self.settings.dev_mode {
            info!(
                target: "fh_telemetry::events",
                category = %event.category,
                severity = %event.severity,
                name = %event.name,
                metadata = %serde_json::Value::Object(event.metadata.clone().into_iter().collect()),
                "telemetry event"
            );
        }

        if severity.is_error() {
            self.persist(&event);
        }

        event
    }

    fn notify(&self, event: &TelemetryEvent) {
        let callbacks: Vec<(u64, Callback)> = {
            let list = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
            list.entries.clone()
        };
        if callbacks.is_empty() {
            return;
        }
        // A subscriber panicking while a panic is already being handled
        // would abort the process; panic events skip the fan-out.
        if std::thread::panicking() {
            return;
        }

        let _delivery = hooks::DeliveryGuard::enter();
        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(subscriber = id, event = %event.name, "telemetry subscriber panicked");
            }
        }
    }

    fn persist(&self, event: &TelemetryEvent) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.persist(event) {
            warn!(error = %e, event = %event.name, "failed to persist critical event");
            return;
        }
        if let Err(e) = store.prune(self.settings.max_persisted) {
            warn!(error = %e, "failed to prune persisted critical events");
        }
    }

    // ---------------------------------------------------------------
    // Performance timers
    // ---------------------------------------------------------------

    pub fn start_performance(&self, name: &str, metadata: Metadata) {
        let replaced = self.lock_state().timers.start(name, metadata);
        if replaced {
            debug!(timer = name, "performance timer restarted");
        }
    }

    /// End a timer, emitting a `<name>_duration` PERFORMANCE event.
    ///
    /// Returns the duration in ms, or `None` (with a warning) when no
    /// timer of that name is pending.
    pub fn end_performance(&self, name: &str, metadata: Metadata) -> Option<f64> {
        let metric = self.lock_state().timers.finish(name);
        let Some(metric) = metric else {
            warn!(timer = name, "performance timer not found");
            return None;
        };
        let duration = metric.elapsed_ms();
        Some(self.record_duration(name, duration, metric.start_time, metric.metadata, metadata))
    }

    /// Record an externally measured duration as a PERFORMANCE event.
    pub fn record_performance(&self, name: &str, duration_ms: f64, metadata: Metadata) -> f64 {
        let start = fh_common::now_millis() - duration_ms as i64;
        self.record_duration(name, duration_ms, start, Metadata::new(), metadata)
    }

    fn record_duration(
        &self,
        name: &str,
        duration: f64,
        start_time: i64,
        start_metadata: Metadata,
        end_metadata: Metadata,
    ) -> f64 {
        let mut metadata = start_metadata;
        metadata.extend(end_metadata);
        metadata.insert("duration_ms".to_string(), json!(duration));
        metadata.insert("start_time".to_string(), json!(start_time));

        let severity = if duration > self.settings.slow_operation_ms {
            Severity::Warning
        } else {
            Severity::Info
        };
        let mut draft = EventDraft::new(
            Category::Performance,
            severity,
            format!("{}{}", name, DURATION_SUFFIX),
        )
        .metadata(metadata);
        draft.duration = Some(duration);
        self.record(draft);
        duration
    }

    /// Run `f` between a start and end of the named timer.
    pub fn time<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        self.start_performance(name, Metadata::new());
        let out = f();
        self.end_performance(name, Metadata::new());
        out
    }

    // ---------------------------------------------------------------
    // Typed wrappers
    // ---------------------------------------------------------------

    pub fn track_user_action(&self, action: &str, metadata: Metadata) -> TelemetryEvent {
        self.record(EventDraft::new(Category::UserAction, Severity::Info, action).metadata(metadata))
    }

    /// Record a state transition; both values pass the size/serializability guard.
    pub fn track_state_change<O, N>(&self, name: &str, old_value: &O, new_value: &N) -> TelemetryEvent
    where
        O: Serialize + ?Sized,
        N: Serialize + ?Sized,
    {
        let old = self.sanitizer.sanitize(old_value);
        let new = self.sanitizer.sanitize(new_value);
        let mut metadata = Metadata::new();
        metadata.insert("state".to_string(), json!(name));
        metadata.insert("old_value".to_string(), old.value);
        metadata.insert("new_value".to_string(), new.value);
        self.record(
            EventDraft::new(Category::StateChange, Severity::Info, name).metadata(metadata),
        )
    }

    /// Record an API call; status >= 400 is an ERROR.
    pub fn track_api_call(
        &self,
        method: &str,
        endpoint: &str,
        status: u16,
        duration_ms: f64,
        metadata: Metadata,
    ) -> TelemetryEvent {
        let mut metadata = metadata;
        metadata.insert("method".to_string(), json!(method.to_ascii_uppercase()));
        metadata.insert("endpoint".to_string(), json!(endpoint));
        metadata.insert("status".to_string(), json!(status));
        metadata.insert("duration_ms".to_string(), json!(duration_ms));
        let severity = if status >= 400 {
            Severity::Error
        } else {
            Severity::Info
        };
        let mut draft = EventDraft::new(
            Category::ApiCall,
            severity,
            format!("{} {}", method.to_ascii_uppercase(), endpoint),
        )
        .metadata(metadata);
        draft.duration = Some(duration_ms);
        self.record(draft)
    }

    /// Record a route change and make `to` the current location.
    pub fn track_navigation(&self, from: &str, to: &str, metadata: Metadata) -> TelemetryEvent {
        self.lock_state().context.location = to.to_string();
        let mut metadata = metadata;
        metadata.insert("from".to_string(), json!(from));
        metadata.insert("to".to_string(), json!(to));
        self.record(
            EventDraft::new(Category::Navigation, Severity::Info, format!("{} -> {}", from, to))
                .metadata(metadata),
        )
    }

    /// Record a captured error at ERROR severity.
    pub fn track_error(&self, error: &CapturedError, context: Metadata) -> TelemetryEvent {
        self.track_error_with_severity(error, context, Severity::Error)
    }

    pub fn track_error_with_severity(
        &self,
        error: &CapturedError,
        context: Metadata,
        severity: Severity,
    ) -> TelemetryEvent {
        let mut metadata = context;
        metadata.insert("error_name".to_string(), json!(error.name));
        metadata.insert("message".to_string(), json!(error.message));
        if let Some(cause) = &error.cause {
            metadata.insert("cause".to_string(), json!(cause.to_string()));
        }
        let mut draft =
            EventDraft::new(Category::Error, severity, error.name.clone()).metadata(metadata);
        draft.stack = error.stack.clone();
        self.record(draft)
    }

    pub fn track_data_mutation(
        &self,
        entity: &str,
        operation: &str,
        record_id: Option<&str>,
        metadata: Metadata,
    ) -> TelemetryEvent {
        let mut metadata = metadata;
        metadata.insert("entity".to_string(), json!(entity));
        metadata.insert("operation".to_string(), json!(operation));
        if let Some(id) = record_id {
            metadata.insert("record_id".to_string(), json!(id));
        }
        self.record(
            EventDraft::new(
                Category::DataMutation,
                Severity::Info,
                format!("{}.{}", entity, operation),
            )
            .metadata(metadata),
        )
    }

    /// Record a render pass; slow renders are WARNING.
    pub fn track_render(&self, component: &str, duration_ms: f64, metadata: Metadata) -> TelemetryEvent {
        let mut metadata = metadata;
        metadata.insert("component".to_string(), json!(component));
        metadata.insert("duration_ms".to_string(), json!(duration_ms));
        let severity = if duration_ms > self.settings.slow_operation_ms {
            Severity::Warning
        } else {
            Severity::Info
        };
        let mut draft = EventDraft::new(Category::Render, severity, component).metadata(metadata);
        draft.duration = Some(duration_ms);
        self.record(draft)
    }

    /// Record a failed background task nobody awaited.
    pub fn track_rejection(&self, error: &CapturedError) -> TelemetryEvent {
        let mut metadata = Metadata::new();
        metadata.insert("reason".to_string(), json!(error.to_string()));
        metadata.insert("error_name".to_string(), json!(error.name));
        let mut draft = EventDraft::new(
            Category::Error,
            Severity::Error,
            event_names::UNHANDLED_REJECTION,
        )
        .metadata(metadata);
        draft.stack = error.stack.clone();
        self.record(draft)
    }

    pub(crate) fn track_panic(&self, metadata: Metadata, stack: String) -> TelemetryEvent {
        let mut draft = EventDraft::new(Category::Error, Severity::Error, event_names::UNCAUGHT_PANIC)
            .metadata(metadata);
        draft.stack = Some(stack);
        self.record(draft)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Events matching `filter`, newest first.
    pub fn get_events(&self, filter: &EventFilter) -> Vec<TelemetryEvent> {
        self.lock_state()
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// All events, newest first.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock_state().events.iter().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.lock_state().events.len()
    }

    pub fn get_statistics(&self) -> TelemetryStatistics {
        let state = self.lock_state();
        TelemetryStatistics::compute(state.events.iter())
    }

    /// Register a callback invoked synchronously for every new event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TelemetryEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entries
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            list: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entries
            .len()
    }

    pub fn export(&self) -> EventExport {
        let state = self.lock_state();
        EventExport {
            schema_version: SCHEMA_VERSION.to_string(),
            session_id: self.session_id.clone(),
            user_id: state.user_id.clone(),
            events: state.events.iter().cloned().collect(),
            statistics: TelemetryStatistics::compute(state.events.iter()),
            export_timestamp: fh_common::now_millis(),
        }
    }

    /// Pretty-printed JSON export of the session.
    pub fn export_events(&self) -> String {
        let export = self.export();
        serde_json::to_string_pretty(&export).unwrap_or_else(|e| {
            warn!(error = %e, "event export failed");
            format!(
                r#"{{"error":"serialization_failed","session_id":"{}"}}"#,
                export.session_id
            )
        })
    }

    /// Drop events older than `max_age_ms`; returns how many were removed.
    pub fn clear_old_events(&self, max_age_ms: i64) -> usize {
        let cutoff = fh_common::now_millis() - max_age_ms;
        let mut state = self.lock_state();
        let before = state.events.len();
        state.events.retain(|e| e.timestamp >= cutoff);
        let removed = before - state.events.len();
        if removed > 0 {
            debug!(removed, max_age_ms, "cleared old telemetry events");
        }
        removed
    }

    // ---------------------------------------------------------------
    // Session context
    // ---------------------------------------------------------------

    pub fn set_user_id(&self, user_id: Option<String>) {
        self.lock_state().user_id = user_id;
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock_state().user_id.clone()
    }

    pub fn context(&self) -> ClientContext {
        self.lock_state().context.clone()
    }

    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        self.lock_state().context.viewport = viewport;
    }

    pub fn set_online(&self, online: bool) {
        self.lock_state().context.online = online;
    }

    pub fn location(&self) -> String {
        self.lock_state().context.location.clone()
    }

    /// Record a visibility change of the host application.
    pub fn set_visibility(&self, visibility: Visibility) -> Option<TelemetryEvent> {
        {
            let mut state = self.lock_state();
            if state.context.visibility == visibility {
                return None;
            }
            state.context.visibility = visibility;
        }
        let mut metadata = Metadata::new();
        metadata.insert("visibility".to_string(), json!(visibility.as_str()));
        Some(self.record(
            EventDraft::new(
                Category::Lifecycle,
                Severity::Info,
                event_names::VISIBILITY_CHANGE,
            )
            .metadata(metadata),
        ))
    }

    /// Emit `SESSION_END` once; later calls return `None`.
    pub fn end_session(&self) -> Option<TelemetryEvent> {
        let total = {
            let mut state = self.lock_state();
            if state.ended {
                return None;
            }
            state.ended = true;
            state.events.len()
        };
        let duration = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut metadata = Metadata::new();
        metadata.insert("session_duration_ms".to_string(), json!(duration));
        metadata.insert("total_events".to_string(), json!(total));
        info!(session_id = %self.session_id, total_events = total, "telemetry session ended");
        Some(self.record(
            EventDraft::new(Category::Lifecycle, Severity::Info, event_names::SESSION_END)
                .metadata(metadata),
        ))
    }
}
