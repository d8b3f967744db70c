//! FinanceHub telemetry core.
//!
//! This crate ties the event bus to the forensic side of the subsystem:
//! - Process flow tracking with causal chains for failures
//! - Interaction recording with privacy sanitization
//! - Deep error analysis producing [`fh_report::DeepErrorReport`]s
//! - Runtime environment probes and console capture
//! - Logging setup and the session runtime
//!
//! The binary entry point is in `main.rs`.

pub mod analyzer;
pub mod console;
pub mod exit_codes;
pub mod flow;
pub mod interaction;
pub mod logging;
pub mod probe;
pub mod runtime;
pub mod scenario;

pub use analyzer::{AnalyzerSettings, DeepErrorAnalyzer};
pub use console::{ConsoleBuffer, ConsoleCaptureLayer};
pub use flow::{ProcessFlowTracker, ProcessTree};
pub use interaction::{DomEvent, DomTarget, InteractionRecorder, InteractionSettings};
pub use probe::{EnvironmentProbe, HostProbe, StaticProbe};
pub use runtime::{MaintenanceReport, TelemetryRuntime};
