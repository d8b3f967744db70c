//! Identifier types for telemetry records.
//!
//! Every record id is built from the creation time plus a short random
//! base32 suffix, so ids sort roughly by creation order and stay readable
//! when pasted into a report.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! time_prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Prefix used by every id of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new id stamped with the current time.
            pub fn new() -> Self {
                $name(format!(
                    "{}-{}-{}",
                    $prefix,
                    chrono::Utc::now().timestamp_millis(),
                    generate_base32_suffix(6)
                ))
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

time_prefixed_id!(
    /// Telemetry event id. Format: `evt-<epoch_ms>-<suffix>`.
    EventId,
    "evt"
);

time_prefixed_id!(
    /// Process-flow node id. Format: `proc-<epoch_ms>-<suffix>`.
    FlowId,
    "proc"
);

time_prefixed_id!(
    /// Recorded user interaction id. Format: `int-<epoch_ms>-<suffix>`.
    InteractionId,
    "int"
);

time_prefixed_id!(
    /// Deep error report id. Format: `rpt-<epoch_ms>-<suffix>`.
    ReportId,
    "rpt"
);

/// Session ID for one telemetry session (one application lifetime).
///
/// Format: `fh-YYYYMMDD-HHMMSS-XXXX`
/// Example: `fh-20260115-143022-a7xq`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        SessionId(format!(
            "fh-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            generate_base32_suffix(4)
        ))
    }

    /// Parse an existing session ID string.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 23 {
            return None;
        }
        let bytes = s.as_bytes();
        if bytes.first() != Some(&b'f')
            || bytes.get(1) != Some(&b'h')
            || bytes.get(2) != Some(&b'-')
            || bytes.get(11) != Some(&b'-')
            || bytes.get(18) != Some(&b'-')
        {
            return None;
        }
        let date = &s[3..11];
        let time = &s[12..18];
        let suffix = &s[19..23];
        if !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if !suffix.chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')) {
            return None;
        }
        Some(SessionId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn generate_base32_suffix(len: usize) -> String {
    let uuid = uuid::Uuid::new_v4();
    let mut value = u128::from_be_bytes(*uuid.as_bytes());
    let alphabet = b"abcdefghijklmnopqrstuvwxyz234567";
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(alphabet[(value & 0x1F) as usize] as char);
        value >>= 5;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let sid = SessionId::new();
        assert!(sid.0.starts_with("fh-"));
        assert_eq!(sid.0.len(), 23);
        assert!(SessionId::parse(&sid.0).is_some());
    }

    #[test]
    fn test_session_id_parse_rejects_garbage() {
        assert!(SessionId::parse("pt-20260115-143022-a7xq").is_none());
        assert!(SessionId::parse("fh-2026011x-143022-a7xq").is_none());
        assert!(SessionId::parse("fh-20260115-143022-A7XQ").is_none());
        assert!(SessionId::parse("").is_none());
    }

    #[test]
    fn test_event_ids_are_unique_and_prefixed() {
        let a = EventId::new();
        let b = EventId::new();
        assert!(a.as_str().starts_with("evt-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_flow_id_shape() {
        let id = FlowId::new();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "proc");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn test_id_display_matches_inner() {
        let id = InteractionId::from("int-1-abcdef");
        assert_eq!(id.to_string(), "int-1-abcdef");
        assert_eq!(ReportId::PREFIX, "rpt");
    }
}
