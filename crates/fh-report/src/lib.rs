//! Deep error reports for FinanceHub.
//!
//! A [`DeepErrorReport`] is the immutable snapshot the error analyzer builds
//! at the moment of a failure. This crate holds its section types and turns
//! it into Markdown meant to be pasted into an LLM conversation.
//!
//! # Outputs
//!
//! - Full report: identity, stack, trigger chain, timeline, interactions,
//!   process flow, runtime snapshot, console lines, environment and a
//!   closing analysis request
//! - Quick report: error, `file:line`, trigger, last action, top stack lines
//! - JSON: the report itself
//!
//! # Delivery
//!
//! [`copy_to_clipboard`] pipes the full report into the first clipboard
//! helper that accepts it; [`download_as_markdown`] writes
//! `error-report-<timestamp>.md`.
//!
//! # Example
//!
//! ```no_run
//! use fh_report::{download_as_markdown, generate_quick_report, DeepErrorReport};
//! use std::path::Path;
//!
//! fn deliver(report: &DeepErrorReport) -> fh_report::Result<()> {
//!     println!("{}", generate_quick_report(report));
//!     download_as_markdown(report, Path::new("reports"))?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deliver;
pub mod error;
pub mod generator;
pub mod report;
pub mod sections;

pub use config::{ReportConfig, ReportSections, DEFAULT_QUICK_STACK_LINES};
pub use deliver::{
    copy_to_clipboard, download_as_markdown, Clipboard, ClipboardCommand, SystemClipboard,
};
pub use error::{ReportError, Result};
pub use generator::{generate_llm_report, generate_quick_report, ReportGenerator};
pub use report::DeepErrorReport;
pub use sections::{
    format_bytes, ApiFailure, CallSite, Capability, ConnectionInfo, ConsoleLevel, ConsoleLine,
    ErrorSection, FlowSection, MemoryInfo, ReportMetadata, ResourceCounts, ResourceKind,
    RuntimeSnapshot, TimelineSection, TimingInfo, TriggerSection, ViewportInfo, NO_FLOW_DATA,
};
