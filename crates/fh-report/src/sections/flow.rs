//! Process-flow excerpt.

use fh_common::{FlowStats, ProcessFlow};
use serde::{Deserialize, Serialize};

/// Placeholder when the tracker holds nothing to show.
pub const NO_FLOW_DATA: &str = "No process flow data available";

/// Causal chain and tracker state at the moment of failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSection {
    /// Error chain, root to failing leaf.
    pub error_chain: Vec<ProcessFlow>,
    /// Processes still running.
    pub active: Vec<ProcessFlow>,
    /// Recently completed processes, newest first.
    pub history: Vec<ProcessFlow>,
    /// Tree of the chain root, a flat summary, or [`NO_FLOW_DATA`].
    pub visualization: String,
    pub stats: FlowStats,
}

impl Default for FlowSection {
    fn default() -> Self {
        Self {
            error_chain: Vec::new(),
            active: Vec::new(),
            history: Vec::new(),
            visualization: NO_FLOW_DATA.to_string(),
            stats: FlowStats::default(),
        }
    }
}

impl FlowSection {
    /// Failing leaf of the error chain.
    pub fn failing_process(&self) -> Option<&ProcessFlow> {
        self.error_chain.last()
    }

    /// Chain names joined root to leaf.
    pub fn chain_text(&self) -> String {
        self.error_chain
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}
