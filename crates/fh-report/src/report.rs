//! The forensic snapshot handed to the formatters.

use chrono::{DateTime, Utc};
use fh_common::{InteractionEvent, ReportId};
use serde::{Deserialize, Serialize};

use crate::sections::*;

/// Everything known at the moment of one failure.
///
/// Built once by the error analyzer and never mutated afterwards; the
/// formatters only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepErrorReport {
    pub id: ReportId,
    pub generated_at: DateTime<Utc>,
    pub error: ErrorSection,
    pub call_site: CallSite,
    pub timeline: TimelineSection,
    pub trigger: TriggerSection,
    pub flow: FlowSection,
    pub runtime: RuntimeSnapshot,
    /// Most recent captured log lines, oldest first.
    #[serde(default)]
    pub console: Vec<ConsoleLine>,
    /// Most recent recorded interactions, newest first.
    #[serde(default)]
    pub interactions: Vec<InteractionEvent>,
    pub metadata: ReportMetadata,
}

impl DeepErrorReport {
    /// One-line human summary, e.g. `TypeError: boom in TransactionsView`.
    pub fn summary(&self) -> String {
        let mut out = self.error.headline();
        if let Some(component) = self.call_site.component.as_deref() {
            out.push_str(&format!(" in {}", component));
        }
        if let Some(location) = self.call_site.location() {
            out.push_str(&format!(" at {}", location));
        }
        out
    }

    /// File name used when the report is saved as Markdown.
    pub fn file_name(&self) -> String {
        format!("error-report-{}.md", self.generated_at.timestamp_millis())
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
