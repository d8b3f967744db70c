//! Aggregate statistics over the event log.

use fh_common::{Category, Severity, TelemetryEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Suffix appended to timer names for their PERFORMANCE events.
pub const DURATION_SUFFIX: &str = "_duration";

/// Mean duration of one named performance metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStat {
    pub count: usize,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryStatistics {
    pub total_events: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Percentage of ERROR and CRITICAL events, 0 when the log is empty.
    pub error_rate: f64,
    /// Keyed by timer name (the `_duration` suffix stripped).
    pub performance: BTreeMap<String, PerformanceStat>,
}

impl TelemetryStatistics {
    pub fn compute<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryEvent>,
    {
        let mut stats = TelemetryStatistics::default();
        let mut errors = 0usize;
        let mut durations: BTreeMap<String, (usize, f64, f64)> = BTreeMap::new();

        for event in events {
            stats.total_events += 1;
            *stats.by_category.entry(event.category).or_insert(0) += 1;
            *stats.by_severity.entry(event.severity).or_insert(0) += 1;
            if event.severity.is_error() {
                errors += 1;
            }
            if event.category == Category::Performance {
                if let Some(duration) = event.duration {
                    let name = event
                        .name
                        .strip_suffix(DURATION_SUFFIX)
                        .unwrap_or(&event.name)
                        .to_string();
                    let entry = durations.entry(name).or_insert((0, 0.0, 0.0));
                    entry.0 += 1;
                    entry.1 += duration;
                    entry.2 = entry.2.max(duration);
                }
            }
        }

        if stats.total_events > 0 {
            stats.error_rate = errors as f64 / stats.total_events as f64 * 100.0;
        }
        stats.performance = durations
            .into_iter()
            .map(|(name, (count, sum, max))| {
                (
                    name,
                    PerformanceStat {
                        count,
                        avg_ms: sum / count as f64,
                        max_ms: max,
                    },
                )
            })
            .collect();
        stats
    }

    pub fn count_for(&self, category: Category) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }
}
