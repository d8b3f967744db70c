//! Named performance timers.

use fh_common::Metadata;
use std::collections::HashMap;
use std::time::Instant;

/// A started, not yet ended, timer.
#[derive(Debug, Clone)]
pub struct PerformanceMetric {
    pub name: String,
    /// Wall-clock start, ms since epoch.
    pub start_time: i64,
    started: Instant,
    pub metadata: Metadata,
}

impl PerformanceMetric {
    pub fn start(name: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            name: name.into(),
            start_time: fh_common::now_millis(),
            started: Instant::now(),
            metadata,
        }
    }

    /// Milliseconds elapsed since the timer started.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

/// Pending timers keyed by name.
///
/// Timers have no identity beyond their name: starting a timer that is
/// already pending replaces it.
#[derive(Debug, Default)]
pub struct PerformanceTimers {
    pending: HashMap<String, PerformanceMetric>,
}

impl PerformanceTimers {
    /// Start a timer; returns true when an existing timer was replaced.
    pub fn start(&mut self, name: &str, metadata: Metadata) -> bool {
        self.pending
            .insert(name.to_string(), PerformanceMetric::start(name, metadata))
            .is_some()
    }

    pub fn finish(&mut self, name: &str) -> Option<PerformanceMetric> {
        self.pending.remove(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
