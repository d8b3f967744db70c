//! Lifecycle of one telemetry session.
//!
//! [`TelemetryRuntime`] constructs every component once from configuration,
//! wires them together and owns the periodic maintenance thread. Consumers
//! receive the components through accessors instead of global lookups.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use fh_common::now_millis;
use fh_config::TelemetryConfig;
use fh_telemetry::{install_panic_hook, TelemetryCore};
use tracing::{debug, info, warn};

use crate::analyzer::{AnalyzerSettings, DeepErrorAnalyzer};
use crate::console::ConsoleBuffer;
use crate::flow::ProcessFlowTracker;
use crate::interaction::{InteractionRecorder, InteractionSettings};
use crate::logging::targets;
use crate::probe::{EnvironmentProbe, HostProbe};

/// What one maintenance pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub events_removed: usize,
    pub processes_removed: usize,
    pub scroll_flushed: bool,
}

#[derive(Debug, Clone)]
struct Components {
    core: Arc<TelemetryCore>,
    tracker: Arc<ProcessFlowTracker>,
    recorder: Arc<InteractionRecorder>,
    max_age_ms: i64,
}

impl Components {
    fn maintain(&self) -> MaintenanceReport {
        let report = MaintenanceReport {
            events_removed: self.core.clear_old_events(self.max_age_ms),
            processes_removed: self.tracker.cleanup(self.max_age_ms),
            scroll_flushed: self.recorder.flush_pending(now_millis()).is_some(),
        };
        debug!(
            target: targets::RUNTIME,
            events_removed = report.events_removed,
            processes_removed = report.processes_removed,
            "maintenance pass"
        );
        report
    }
}

/// Handle to the running maintenance thread.
#[derive(Debug)]
struct MaintenanceThread {
    stop: Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl MaintenanceThread {
    fn spawn(components: Components, interval: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("fh-maintenance".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        components.maintain();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Self { stop, thread })
    }

    fn stop(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            warn!(target: targets::RUNTIME, "maintenance thread panicked");
        }
    }
}

/// All telemetry components of one session.
pub struct TelemetryRuntime {
    config: TelemetryConfig,
    components: Components,
    analyzer: DeepErrorAnalyzer,
    console: ConsoleBuffer,
    probe: Arc<HostProbe>,
    maintenance: Mutex<Option<MaintenanceThread>>,
}

impl std::fmt::Debug for TelemetryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryRuntime")
            .field("session_id", self.components.core.session_id())
            .field("running", &self.is_running())
            .finish()
    }
}

impl TelemetryRuntime {
    /// Build every component from `config`, capturing console lines into
    /// `console` (the buffer whose layer was registered with logging).
    pub fn new(config: TelemetryConfig, console: ConsoleBuffer) -> Self {
        Self::with_core(
            Arc::new(TelemetryCore::from_config(&config)),
            config,
            console,
        )
    }

    /// Like [`new`](Self::new) around an existing event bus.
    pub fn with_core(
        core: Arc<TelemetryCore>,
        config: TelemetryConfig,
        console: ConsoleBuffer,
    ) -> Self {
        let tracker = Arc::new(ProcessFlowTracker::from_config(&config.processes));
        let recorder = Arc::new(InteractionRecorder::new(
            Arc::clone(&core),
            InteractionSettings::from_config(&config.interactions),
        ));
        let probe = Arc::new(HostProbe::new());
        let probe_dyn: Arc<dyn EnvironmentProbe> = probe.clone();
        let analyzer = DeepErrorAnalyzer::new(
            Arc::clone(&core),
            Arc::clone(&tracker),
            console.clone(),
            AnalyzerSettings::from_config(&config.analyzer),
        )
        .with_recorder(Arc::clone(&recorder))
        .with_probe(probe_dyn);

        Self {
            components: Components {
                core,
                tracker,
                recorder,
                max_age_ms: config.maintenance.max_event_age_ms,
            },
            config,
            analyzer,
            console,
            probe,
            maintenance: Mutex::new(None),
        }
    }

    /// Install the panic hook, start interaction capture and the
    /// maintenance thread. Calling it again is a no-op.
    pub fn start(&self) {
        let mut maintenance = self.maintenance.lock().unwrap_or_else(|p| p.into_inner());
        if maintenance.is_some() {
            return;
        }
        install_panic_hook(&self.components.core);
        self.components.recorder.start();

        let interval = Duration::from_secs(self.config.maintenance.interval_secs.max(1));
        match MaintenanceThread::spawn(self.components.clone(), interval) {
            Ok(handle) => *maintenance = Some(handle),
            Err(e) => warn!(
                target: targets::RUNTIME,
                error = %e,
                "maintenance thread not started; call run_maintenance_once instead"
            ),
        }
        info!(
            target: targets::RUNTIME,
            session_id = %self.components.core.session_id(),
            interval_secs = interval.as_secs(),
            "telemetry runtime started"
        );
    }

    pub fn is_running(&self) -> bool {
        self.maintenance
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// One maintenance pass: age out events and finished processes, settle
    /// a pending scroll.
    pub fn run_maintenance_once(&self) -> MaintenanceReport {
        self.components.maintain()
    }

    /// Stop background work and end the session. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .maintenance
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
        self.components.recorder.stop();
        if self.components.core.end_session().is_some() {
            info!(
                target: targets::RUNTIME,
                session_id = %self.components.core.session_id(),
                "telemetry runtime stopped"
            );
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn core(&self) -> &Arc<TelemetryCore> {
        &self.components.core
    }

    pub fn tracker(&self) -> &Arc<ProcessFlowTracker> {
        &self.components.tracker
    }

    pub fn recorder(&self) -> &Arc<InteractionRecorder> {
        &self.components.recorder
    }

    pub fn analyzer(&self) -> &DeepErrorAnalyzer {
        &self.analyzer
    }

    pub fn console(&self) -> &ConsoleBuffer {
        &self.console
    }

    pub fn probe(&self) -> &HostProbe {
        &self.probe
    }
}

impl Drop for TelemetryRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fh_common::{Category, Metadata};
    use fh_telemetry::{event_names, EventFilter};

    fn runtime() -> TelemetryRuntime {
        let mut config = TelemetryConfig::default();
        config.storage.enabled = false;
        TelemetryRuntime::new(config, ConsoleBuffer::default())
    }

    #[test]
    fn test_start_and_shutdown() {
        let rt = runtime();
        assert!(!rt.is_running());
        rt.start();
        rt.start();
        assert!(rt.is_running());
        assert!(rt.recorder().is_recording());

        rt.shutdown();
        assert!(!rt.is_running());
        assert!(!rt.recorder().is_recording());
        let ends = rt
            .core()
            .get_events(&EventFilter::new().category(Category::Lifecycle))
            .into_iter()
            .filter(|e| e.name == event_names::SESSION_END)
            .count();
        assert_eq!(ends, 1);

        rt.shutdown();
    }

    #[test]
    fn test_maintenance_keeps_fresh_data() {
        let rt = runtime();
        rt.core().track_user_action("click:button#save", Metadata::new());
        let id = rt.tracker().start_process("sync", Metadata::new(), vec![]);
        rt.tracker().end_process(&id, None);

        let report = rt.run_maintenance_once();
        assert_eq!(report, MaintenanceReport::default());
        assert_eq!(rt.tracker().get_process_history(10).len(), 1);
    }

    #[test]
    fn test_components_share_core() {
        let rt = runtime();
        let report = rt
            .analyzer()
            .analyze_error(&fh_common::CapturedError::message("boom"), "", Metadata::new());
        assert_eq!(&report.metadata.session_id, rt.core().session_id());
        assert!(!report.metadata.platform.is_empty());
    }
}
