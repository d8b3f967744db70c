//! Runtime snapshot taken at the moment of failure.
//!
//! Every probed value is a [`Capability`]: either the measured value or the
//! reason the runtime could not supply it. A report is always produced, with
//! missing capabilities rendered as unavailable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A probed runtime capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Capability<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Capability::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Capability::Available(v) => Some(v),
            Capability::Unavailable(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Capability<U> {
        match self {
            Capability::Available(v) => Capability::Available(f(v)),
            Capability::Unavailable(reason) => Capability::Unavailable(reason),
        }
    }

    /// Render with `f`, or `unavailable (reason)`.
    pub fn describe(&self, f: impl FnOnce(&T) -> String) -> String {
        match self {
            Capability::Available(v) => f(v),
            Capability::Unavailable(reason) => format!("unavailable ({})", reason),
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Capability::Available(v),
            None => Capability::unavailable("not exposed by runtime"),
        }
    }
}

/// Memory usage in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub used_bytes: u64,
    pub total_bytes: Option<u64>,
    pub limit_bytes: Option<u64>,
}

impl MemoryInfo {
    /// Used share of the limit, in percent.
    pub fn usage_pct(&self) -> Option<f64> {
        self.limit_bytes
            .filter(|l| *l > 0)
            .map(|l| 100.0 * self.used_bytes as f64 / l as f64)
    }
}

/// Network connection hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub effective_type: String,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
    pub save_data: bool,
}

/// Viewport size and device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

/// Load and uptime timing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingInfo {
    /// Time since the runtime clock origin.
    pub since_start_ms: f64,
    pub dom_content_loaded_ms: Option<f64>,
    pub load_complete_ms: Option<f64>,
}

/// Kind of a loaded resource, by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    Stylesheet,
    Image,
    Font,
    Other,
}

impl ResourceKind {
    /// Classify a resource URL or path by its extension.
    pub fn classify(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = match path.rsplit_once('.') {
            Some((_, ext)) if !ext.contains('/') => ext.to_ascii_lowercase(),
            _ => return ResourceKind::Other,
        };
        match ext.as_str() {
            "js" | "mjs" => ResourceKind::Script,
            "css" => ResourceKind::Stylesheet,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" => ResourceKind::Image,
            "woff" | "woff2" | "ttf" | "otf" | "eot" => ResourceKind::Font,
            _ => ResourceKind::Other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Script => "script",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Image => "image",
            ResourceKind::Font => "font",
            ResourceKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Loaded resources counted by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub script: usize,
    pub stylesheet: usize,
    pub image: usize,
    pub font: usize,
    pub other: usize,
}

impl ResourceCounts {
    pub fn from_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts = ResourceCounts::default();
        for url in urls {
            counts.add(ResourceKind::classify(url));
        }
        counts
    }

    pub fn add(&mut self, kind: ResourceKind) {
        match kind {
            ResourceKind::Script => self.script += 1,
            ResourceKind::Stylesheet => self.stylesheet += 1,
            ResourceKind::Image => self.image += 1,
            ResourceKind::Font => self.font += 1,
            ResourceKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.script + self.stylesheet + self.image + self.font + self.other
    }
}

/// Runtime state captured by an environment probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    pub memory: Capability<MemoryInfo>,
    pub connection: Capability<ConnectionInfo>,
    pub viewport: Capability<ViewportInfo>,
    pub timing: Capability<TimingInfo>,
    pub resources: Capability<ResourceCounts>,
}

impl RuntimeSnapshot {
    /// Snapshot with every capability missing for the same reason.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            memory: Capability::unavailable(reason),
            connection: Capability::unavailable(reason),
            viewport: Capability::unavailable(reason),
            timing: Capability::unavailable(reason),
            resources: Capability::unavailable(reason),
        }
    }
}

impl Default for RuntimeSnapshot {
    fn default() -> Self {
        Self::unavailable("not probed")
    }
}

/// Human byte size, e.g. `12.4 MB`.
pub fn format_bytes(bytes: u64) -> String {
    match bytes {
        b if b >= 1_073_741_824 => format!("{:.1} GB", b as f64 / 1_073_741_824.0),
        b if b >= 1_048_576 => format!("{:.1} MB", b as f64 / 1_048_576.0),
        b if b >= 1024 => format!("{:.0} KB", b as f64 / 1024.0),
        b => format!("{} B", b),
    }
}
