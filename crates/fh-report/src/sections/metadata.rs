//! Session and platform identity of a report.

use fh_common::{Metadata, SessionId};
use serde::{Deserialize, Serialize};

use super::environment::Capability;

/// Who and where the failure happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub session_id: SessionId,
    pub user_id: Option<String>,
    /// Route or view that was current.
    pub location: String,
    pub user_agent: String,
    /// `os-arch`, e.g. `linux-x86_64`.
    pub platform: String,
    pub locale: Capability<String>,
    pub online: bool,
    /// Caller-supplied extra metadata, sanitized.
    #[serde(default)]
    pub additional: Metadata,
}
