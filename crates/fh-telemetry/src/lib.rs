//! FinanceHub telemetry event bus.
//!
//! This crate provides:
//! - [`TelemetryCore`]: the bounded, newest-first event log of one session
//!   with typed tracking wrappers, filters and statistics
//! - Named performance timers
//! - Synchronous, panic-isolated subscriber fan-out
//! - Best-effort persistence of critical events ([`CriticalEventStore`])
//! - A process-wide panic hook reporting `UNCAUGHT_PANIC` events

pub mod context;
pub mod core;
pub mod filter;
pub mod hooks;
pub mod perf;
pub mod stats;
pub mod store;

pub use crate::core::{event_names, EventExport, Subscription, TelemetryCore, TelemetrySettings};
pub use context::{ClientContext, Viewport, Visibility};
pub use filter::EventFilter;
pub use hooks::install_panic_hook;
pub use perf::{PerformanceMetric, PerformanceTimers};
pub use stats::{PerformanceStat, TelemetryStatistics};
pub use store::{
    CriticalEventStore, FileEventStore, MemoryEventStore, StoreError, DEFAULT_MAX_PERSISTED,
};

/// Default capacity of the in-memory event log.
pub const DEFAULT_CAPACITY: usize = 1000;
