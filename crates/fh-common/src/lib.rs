//! FinanceHub telemetry common types, IDs, and errors.
//!
//! This crate provides the data model shared by every telemetry crate:
//! - Identifier types for events, process flows, sessions and interactions
//! - The structured telemetry event record and its taxonomy
//! - Process-flow nodes and their lifecycle status
//! - Captured interaction records
//! - Owned, comparable error captures
//! - Common error types and output formats

pub mod captured;
pub mod error;
pub mod event;
pub mod flow;
pub mod id;
pub mod interaction;
pub mod output;

pub use captured::CapturedError;
pub use error::{Error, ErrorCategory, Result};
pub use event::{Category, Metadata, Severity, TelemetryEvent};
pub use flow::{format_duration_ms, FlowStats, FlowStatus, ProcessFlow};
pub use id::{EventId, FlowId, InteractionId, ReportId, SessionId};
pub use interaction::{InteractionEvent, InteractionKind, Position, TargetDescriptor};
pub use output::OutputFormat;

/// Schema version stamped on exported telemetry snapshots.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Current wall-clock time as integer milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
