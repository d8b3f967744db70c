//! Process-flow nodes.
//!
//! A `ProcessFlow` is one logical operation in the causal tree kept by the
//! process flow tracker. Status moves one way only:
//! `running -> {success, error, cancelled}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::captured::CapturedError;
use crate::event::Metadata;
use crate::id::FlowId;

/// Lifecycle status of a process-flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStatus {
    Running,
    Success,
    Error,
    Cancelled,
}

impl FlowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowStatus::Running)
    }

    /// Icon used by tree visualizations and flow summaries.
    pub fn icon(&self) -> &'static str {
        match self {
            FlowStatus::Running => "⏳",
            FlowStatus::Success => "✅",
            FlowStatus::Error => "❌",
            FlowStatus::Cancelled => "🚫",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowStatus::Running => "running",
            FlowStatus::Success => "success",
            FlowStatus::Error => "error",
            FlowStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One tracked logical operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessFlow {
    pub id: FlowId,
    /// Operation label, optionally composed as `group:subname`.
    pub name: String,
    /// Start offset in milliseconds from the tracker clock origin.
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// `end_time - start_time`, once ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Wall-clock start, used for age-based cleanup and display.
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FlowId>,
    #[serde(default)]
    pub children: Vec<FlowId>,
    pub status: FlowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CapturedError>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Nesting level; roots are 0.
    pub depth: u32,
}

impl ProcessFlow {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_running(&self) -> bool {
        self.status == FlowStatus::Running
    }

    /// Group part of a `group:subname` label, if present.
    pub fn group(&self) -> Option<&str> {
        self.name.split_once(':').map(|(group, _)| group)
    }

    /// Duration rendered for humans, e.g. `12.3ms` or `1.20s`.
    pub fn duration_label(&self) -> String {
        match self.duration {
            Some(ms) => format_duration_ms(ms),
            None => "running".to_string(),
        }
    }
}

/// Render a millisecond duration the way tree views and reports show it.
pub fn format_duration_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.1}ms", ms)
    }
}

/// Aggregate counters over a set of process-flow nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowStats {
    pub total: usize,
    pub active: usize,
    pub errors: usize,
    /// Mean duration over nodes that have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_duration_ms: Option<f64>,
}

impl FlowStats {
    /// Compute stats over history plus the currently active nodes.
    pub fn compute<'a, H, A>(history: H, active: A) -> Self
    where
        H: IntoIterator<Item = &'a ProcessFlow>,
        A: IntoIterator<Item = &'a ProcessFlow>,
    {
        let mut stats = FlowStats::default();
        let mut duration_sum = 0.0;
        let mut duration_count = 0usize;
        for flow in history.into_iter() {
            stats.total += 1;
            if flow.status == FlowStatus::Error {
                stats.errors += 1;
            }
            if let Some(d) = flow.duration {
                duration_sum += d;
                duration_count += 1;
            }
        }
        for _ in active.into_iter() {
            stats.total += 1;
            stats.active += 1;
        }
        if duration_count > 0 {
            stats.avg_duration_ms = Some(duration_sum / duration_count as f64);
        }
        stats
    }
}
