//! Process flow tracking.
//!
//! Reconstructs "what call led to what call" independently of the flat
//! event log, so a failure can be traced back to the operation that
//! started it.

pub mod tracker;
pub mod tree;

pub use tracker::{FlowExport, ProcessFlowTracker, CANCEL_REASON_KEY, DEFAULT_HISTORY_CAPACITY};
pub use tree::ProcessTree;
