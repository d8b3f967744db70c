//! Structured logging foundation for fh-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for log shippers and CI
//!
//! Either mode can be paired with the console capture layer, which keeps
//! the most recent INFO/WARN/ERROR lines for forensic reports.
//!
//! # Usage
//!
//! ```no_run
//! use fh_core::console::ConsoleBuffer;
//! use fh_core::logging::{init_logging, LogConfig};
//!
//! let console = ConsoleBuffer::default();
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config, Some(console.layer()));
//! tracing::info!(target: "fh_core::cli", "started");
//! ```
//!
//! # Design Notes
//!
//! - stdout is reserved for command payloads (reports, exports)
//! - stderr receives all log output (human or JSONL)
//! - JSONL lines carry `session_id` / `flow_id` from enclosing spans

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{targets, Level};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::console::ConsoleCaptureLayer;

/// Initialize the logging subsystem.
///
/// Call once at startup. `RUST_LOG` directives, when present, replace the
/// level-derived filter for the output layer. The console capture layer
/// always sees INFO and above regardless of output verbosity.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig, console: Option<ConsoleCaptureLayer>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));
    let console = console
        .filter(|_| config.capture_console)
        .map(|layer| layer.with_filter(LevelFilter::INFO));

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(config.source_location)
                .with_line_number(config.source_location)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(console)
                    .with(fmt_layer.with_filter(filter))
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(console)
                    .with(fmt_layer.without_time().with_filter(filter))
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(console)
            .with(JsonlLayer::stderr().with_filter(filter))
            .try_init(),
    };

    result.is_ok()
}
