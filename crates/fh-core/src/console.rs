//! Console capture for forensic reports.
//!
//! A tracing layer that copies INFO/WARN/ERROR lines into a shared ring
//! buffer. It is registered explicitly alongside the output layer, so
//! several analyzers can read the same buffer without intercepting
//! anything twice.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use fh_common::now_millis;
use fh_redact::scrub_secrets;
use fh_report::{ConsoleLevel, ConsoleLine};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Lines kept by the default buffer.
pub const DEFAULT_CONSOLE_CAPACITY: usize = 50;

/// Shared ring of captured console lines, oldest first.
#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    inner: Arc<Mutex<VecDeque<ConsoleLine>>>,
    capacity: usize,
}

impl ConsoleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// A capture layer feeding this buffer.
    pub fn layer(&self) -> ConsoleCaptureLayer {
        ConsoleCaptureLayer {
            buffer: self.clone(),
        }
    }

    pub fn push(&self, line: ConsoleLine) {
        let mut lines = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// The last `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ConsoleLine> {
        let lines = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLE_CAPACITY)
    }
}

/// Tracing layer writing into a [`ConsoleBuffer`].
#[derive(Debug, Clone)]
pub struct ConsoleCaptureLayer {
    buffer: ConsoleBuffer,
}

impl ConsoleCaptureLayer {
    pub fn buffer(&self) -> &ConsoleBuffer {
        &self.buffer
    }
}

fn console_level(level: &Level) -> Option<ConsoleLevel> {
    match *level {
        Level::ERROR => Some(ConsoleLevel::Error),
        Level::WARN => Some(ConsoleLevel::Warn),
        Level::INFO => Some(ConsoleLevel::Log),
        _ => None,
    }
}

/// Renders an event as `message key=value ...`.
struct LineVisitor {
    message: String,
    fields: String,
}

impl tracing::field::Visit for LineVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let Some(level) = console_level(metadata.level()) else {
            return;
        };
        let mut visitor = LineVisitor {
            message: String::new(),
            fields: String::new(),
        };
        event.record(&mut visitor);
        let text = format!("{}{}", visitor.message, visitor.fields);
        self.buffer.push(ConsoleLine {
            timestamp: now_millis(),
            level,
            target: metadata.target().to_string(),
            message: scrub_secrets(text.trim()).into_owned(),
        });
    }
}
