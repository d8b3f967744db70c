//! Secret detection for free text that ends up in telemetry.
//!
//! Text scraped from the UI (button labels, error messages, metadata
//! strings) may contain credentials or card numbers. Matches are replaced
//! in place with a fixed marker so the surrounding text stays readable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Marker substituted for every detected secret.
pub const REDACTED_MARKER: &str = "[REDACTED]";

/// Type of detected secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    /// AWS access key (AKIA...)
    AwsAccessKey,
    /// GitHub personal access token
    GitHubToken,
    /// Slack token (xoxb-...)
    SlackToken,
    /// JSON Web Token
    Jwt,
    /// Private key (PEM format)
    PrivateKey,
    /// OpenAI/Anthropic API key
    AiApiKey,
    /// `Authorization: Bearer ...` style token
    BearerToken,
    /// `password=...`, `token: ...`, `api_key=...` assignments
    CredentialAssignment,
    /// Database connection string with inline credentials
    ConnectionString,
    /// Payment card number (Luhn-valid, 13-19 digits)
    CardNumber,
}

/// Detection pattern definition.
struct DetectionPattern {
    secret_type: SecretType,
    pattern: Lazy<Regex>,
}

// Pre-compiled detection patterns
static PATTERNS: [DetectionPattern; 8] = [
    DetectionPattern {
        secret_type: SecretType::AwsAccessKey,
        pattern: Lazy::new(|| Regex::new(r"AKIA[0-9A-Z]{16}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::GitHubToken,
        pattern: Lazy::new(|| Regex::new(r"gh[pousr]_[A-Za-z0-9_]{36,}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::SlackToken,
        pattern: Lazy::new(|| Regex::new(r"xox[baprs]-[A-Za-z0-9\-]+").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::Jwt,
        pattern: Lazy::new(|| {
            Regex::new(r"eyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").unwrap()
        }),
    },
    DetectionPattern {
        secret_type: SecretType::PrivateKey,
        pattern: Lazy::new(|| Regex::new(r"-----BEGIN[A-Z ]*PRIVATE KEY-----").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::AiApiKey,
        pattern: Lazy::new(|| Regex::new(r"sk-(?:ant-)?[A-Za-z0-9_-]{20,}").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::BearerToken,
        pattern: Lazy::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9\-._~+/]{8,}=*").unwrap()),
    },
    DetectionPattern {
        secret_type: SecretType::CredentialAssignment,
        pattern: Lazy::new(|| {
            Regex::new(r#"(?i)\b(?:password|passwd|pwd|secret|token|api[-_]?key)\s*[=:]\s*[^\s,;"'}]+"#)
                .unwrap()
        }),
    },
];

// Connection string patterns
static CONNECTION_STRING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(postgres|postgresql|mysql|mongodb|redis|amqp)://[^@\s]+@").unwrap()
});

// Candidate card numbers; confirmed with a Luhn check
static CARD_CANDIDATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").unwrap());

/// A detected secret span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Type of secret detected.
    pub secret_type: SecretType,
    /// Start byte offset in the input.
    pub start: usize,
    /// End byte offset in the input.
    pub end: usize,
}

/// Find all secrets in a string with their positions, sorted by start.
pub fn find_all_secrets(value: &str) -> Vec<Detection> {
    let mut detections = Vec::new();

    for pattern in &PATTERNS {
        for m in pattern.pattern.find_iter(value) {
            detections.push(Detection {
                secret_type: pattern.secret_type,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    for m in CONNECTION_STRING_PATTERN.find_iter(value) {
        detections.push(Detection {
            secret_type: SecretType::ConnectionString,
            start: m.start(),
            end: m.end(),
        });
    }

    for m in CARD_CANDIDATE_PATTERN.find_iter(value) {
        if luhn_valid(m.as_str()) {
            detections.push(Detection {
                secret_type: SecretType::CardNumber,
                start: m.start(),
                end: m.end(),
            });
        }
    }

    detections.sort_by_key(|d| (d.start, std::cmp::Reverse(d.end)));
    detections
}

/// First secret type found in the value, if any.
pub fn detect(value: &str) -> Option<SecretType> {
    find_all_secrets(value).first().map(|d| d.secret_type)
}

/// Replace every detected secret with [`REDACTED_MARKER`].
///
/// Overlapping detections are merged. Borrows when nothing matched.
pub fn scrub_secrets(value: &str) -> Cow<'_, str> {
    let detections = find_all_secrets(value);
    if detections.is_empty() {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut cursor = 0;
    for d in detections {
        if d.end <= cursor {
            continue;
        }
        let start = d.start.max(cursor);
        out.push_str(&value[cursor..start]);
        if start == d.start {
            out.push_str(REDACTED_MARKER);
        }
        cursor = d.end;
    }
    out.push_str(&value[cursor..]);
    Cow::Owned(out)
}

fn luhn_valid(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}
