//! Runtime environment probes.
//!
//! A probe answers "what did the runtime look like when it failed".
//! Each capability is probed on its own; one that cannot be read is
//! reported as unavailable with a reason and never aborts the snapshot.

use std::sync::Mutex;
use std::time::Instant;

use fh_report::{
    Capability, ConnectionInfo, MemoryInfo, ResourceCounts, RuntimeSnapshot, TimingInfo,
    ViewportInfo,
};

/// Source of runtime facts for forensic reports.
pub trait EnvironmentProbe: Send + Sync {
    fn snapshot(&self) -> RuntimeSnapshot;

    /// Operating system and architecture, e.g. `linux-x86_64`.
    fn platform(&self) -> String;

    fn locale(&self) -> Capability<String>;
}

/// Probe of the current native process.
#[derive(Debug)]
pub struct HostProbe {
    started: Instant,
    resources: Mutex<Vec<String>>,
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            resources: Mutex::new(Vec::new()),
        }
    }

    /// Note a loaded resource (script, stylesheet, image, font, ...).
    pub fn record_resource(&self, url: &str) {
        self.resources
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());
    }

    fn memory(&self) -> Capability<MemoryInfo> {
        #[cfg(target_os = "linux")]
        {
            match std::fs::read_to_string("/proc/self/status") {
                Ok(status) => match parse_proc_status(&status) {
                    Some(mut info) => {
                        info.limit_bytes = read_cgroup_memory_limit();
                        Capability::Available(info)
                    }
                    None => Capability::unavailable("VmRSS missing from /proc/self/status"),
                },
                Err(e) => Capability::unavailable(format!("/proc/self/status: {}", e)),
            }
        }
        #[cfg(not(target_os = "linux"))]
        {
            Capability::unavailable(format!(
                "process memory not exposed on {}",
                std::env::consts::OS
            ))
        }
    }

    fn timing(&self) -> Capability<TimingInfo> {
        Capability::Available(TimingInfo {
            since_start_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            dom_content_loaded_ms: None,
            load_complete_ms: None,
        })
    }

    fn resources(&self) -> Capability<ResourceCounts> {
        let urls = self.resources.lock().unwrap_or_else(|p| p.into_inner());
        Capability::Available(ResourceCounts::from_urls(urls.iter().map(String::as_str)))
    }
}

impl EnvironmentProbe for HostProbe {
    fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            memory: self.memory(),
            connection: Capability::unavailable("network hints not exposed to native processes"),
            viewport: viewport_from(|name| std::env::var(name).ok()),
            timing: self.timing(),
            resources: self.resources(),
        }
    }

    fn platform(&self) -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }

    fn locale(&self) -> Capability<String> {
        locale_from(|name| std::env::var(name).ok())
    }
}

/// Host-supplied runtime facts, e.g. bridged from a browser.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    pub snapshot: RuntimeSnapshot,
    pub platform: String,
    pub locale: Capability<String>,
}

impl StaticProbe {
    pub fn new(snapshot: RuntimeSnapshot, platform: &str, locale: Capability<String>) -> Self {
        Self {
            snapshot,
            platform: platform.to_string(),
            locale,
        }
    }

    /// Typical browser snapshot with connection hints.
    pub fn with_connection(mut self, connection: ConnectionInfo) -> Self {
        self.snapshot.connection = Capability::Available(connection);
        self
    }
}

impl EnvironmentProbe for StaticProbe {
    fn snapshot(&self) -> RuntimeSnapshot {
        self.snapshot.clone()
    }

    fn platform(&self) -> String {
        self.platform.clone()
    }

    fn locale(&self) -> Capability<String> {
        self.locale.clone()
    }
}

/// Parse `VmRSS` / `VmSize` (kB) from `/proc/<pid>/status` text.
pub fn parse_proc_status(status: &str) -> Option<MemoryInfo> {
    let mut rss = None;
    let mut size = None;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            rss = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            size = parse_kb(rest);
        }
    }
    Some(MemoryInfo {
        used_bytes: rss?,
        total_bytes: size,
        limit_bytes: None,
    })
}

fn parse_kb(value: &str) -> Option<u64> {
    let number = value.split_whitespace().next()?;
    number.parse::<u64>().ok().map(|kb| kb * 1024)
}

/// cgroup v2 `memory.max` of the current process; `max` means unlimited.
#[cfg(target_os = "linux")]
fn read_cgroup_memory_limit() -> Option<u64> {
    let cgroup = std::fs::read_to_string("/proc/self/cgroup").ok()?;
    let path = cgroup.lines().find_map(|line| line.strip_prefix("0::"))?;
    let limit = std::fs::read_to_string(format!("/sys/fs/cgroup{}/memory.max", path.trim())).ok()?;
    parse_memory_max(&limit)
}

fn parse_memory_max(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if trimmed == "max" {
        return None;
    }
    trimmed.parse().ok()
}

/// Terminal dimensions from `COLUMNS` / `LINES`.
pub fn viewport_from(lookup: impl Fn(&str) -> Option<String>) -> Capability<ViewportInfo> {
    let dimension = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u32>().ok());
    match (dimension("COLUMNS"), dimension("LINES")) {
        (Some(width), Some(height)) => Capability::Available(ViewportInfo {
            width,
            height,
            pixel_ratio: 1.0,
        }),
        _ => Capability::unavailable("COLUMNS/LINES not set"),
    }
}

/// First non-empty of `LC_ALL`, `LC_MESSAGES`, `LANG`.
pub fn locale_from(lookup: impl Fn(&str) -> Option<String>) -> Capability<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(Capability::Available)
        .unwrap_or_else(|| Capability::unavailable("LANG not set"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_proc_status() {
        let status = "Name:\tfh-core\nVmSize:\t  204800 kB\nVmRSS:\t   10240 kB\nThreads:\t4\n";
        let info = parse_proc_status(status).unwrap();
        assert_eq!(info.used_bytes, 10240 * 1024);
        assert_eq!(info.total_bytes, Some(204800 * 1024));
        assert!(parse_proc_status("Name:\tx\n").is_none());
    }

    #[test]
    fn test_parse_memory_max() {
        assert_eq!(parse_memory_max("max\n"), None);
        assert_eq!(parse_memory_max("536870912\n"), Some(536870912));
        assert_eq!(parse_memory_max("garbage"), None);
    }

    #[test]
    fn test_viewport_from_env() {
        let viewport = viewport_from(env(&[("COLUMNS", "120"), ("LINES", "40")]));
        let info = viewport.as_option().unwrap();
        assert_eq!((info.width, info.height), (120, 40));
        assert!(!viewport_from(env(&[("COLUMNS", "120")])).is_available());
    }

    #[test]
    fn test_locale_precedence() {
        assert_eq!(
            locale_from(env(&[("LANG", "de_DE.UTF-8"), ("LC_ALL", "en_US.UTF-8")])),
            Capability::Available("en_US.UTF-8".to_string())
        );
        assert_eq!(
            locale_from(env(&[("LC_ALL", " "), ("LANG", "fr_FR")])),
            Capability::Available("fr_FR".to_string())
        );
        assert!(!locale_from(env(&[])).is_available());
    }

    #[test]
    fn test_host_probe_never_fails() {
        let probe = HostProbe::new();
        probe.record_resource("/static/app.js");
        probe.record_resource("/static/theme.css");
        let snapshot = probe.snapshot();
        assert!(!snapshot.connection.is_available());
        assert!(snapshot.timing.is_available());
        let resources = snapshot.resources.as_option().unwrap();
        assert_eq!(resources.script, 1);
        assert_eq!(resources.stylesheet, 1);
        assert!(probe.platform().contains(std::env::consts::OS));
    }

    #[test]
    fn test_static_probe() {
        let probe = StaticProbe::new(
            RuntimeSnapshot::unavailable("bridge offline"),
            "web-chrome",
            Capability::Available("en-GB".to_string()),
        )
        .with_connection(ConnectionInfo {
            effective_type: "4g".to_string(),
            downlink_mbps: Some(10.0),
            rtt_ms: Some(50),
            save_data: false,
        });
        let snapshot = probe.snapshot();
        assert!(snapshot.connection.is_available());
        assert!(!snapshot.memory.is_available());
        assert_eq!(probe.platform(), "web-chrome");
    }
}
