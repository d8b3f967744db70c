//! Clipboard and file delivery of rendered reports.
//!
//! Delivery is best-effort: failures are logged and surfaced as `false` or
//! an error value, never as a panic.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::generator::generate_llm_report;
use crate::report::DeepErrorReport;

/// How long a clipboard helper may run before it is killed.
const CLIPBOARD_TIMEOUT: Duration = Duration::from_secs(2);

/// Destination for copied report text.
pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> Result<()>;
}

/// One external clipboard helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ClipboardCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// OS clipboard through the first helper that accepts the text.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    commands: Vec<ClipboardCommand>,
}

impl SystemClipboard {
    /// Helpers tried in order: wl-copy, xclip, xsel, pbcopy, clip.
    pub fn new() -> Self {
        Self {
            commands: vec![
                ClipboardCommand::new("wl-copy", &[]),
                ClipboardCommand::new("xclip", &["-selection", "clipboard"]),
                ClipboardCommand::new("xsel", &["--clipboard", "--input"]),
                ClipboardCommand::new("pbcopy", &[]),
                ClipboardCommand::new("clip", &[]),
            ],
        }
    }

    /// Use an explicit helper list.
    pub fn with_commands(commands: Vec<ClipboardCommand>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[ClipboardCommand] {
        &self.commands
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut failures = Vec::new();
        for command in &self.commands {
            match pipe_to(command, text.as_bytes()) {
                Ok(()) => {
                    debug!(program = %command.program, "clipboard helper accepted text");
                    return Ok(());
                }
                Err(e) => failures.push(format!("{}: {}", command.program, e)),
            }
        }
        Err(ReportError::ClipboardUnavailable(if failures.is_empty() {
            "no clipboard helpers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

fn pipe_to(command: &ClipboardCommand, data: &[u8]) -> std::result::Result<(), String> {
    let start = Instant::now();
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(data) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(format!("failed to write stdin: {e}"));
        }
    }

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > CLIPBOARD_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("timed out after {}ms", CLIPBOARD_TIMEOUT.as_millis()));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => return Err(format!("wait failed: {e}")),
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(format!("exited with code {}", status.code().unwrap_or(-1)))
    }
}

/// Copy the full Markdown report to `clipboard`. Returns whether it worked.
pub fn copy_to_clipboard(report: &DeepErrorReport, clipboard: &dyn Clipboard) -> bool {
    let text = generate_llm_report(report);
    match clipboard.set_text(&text) {
        Ok(()) => {
            info!(report_id = %report.id, bytes = text.len(), "report copied to clipboard");
            true
        }
        Err(e) => {
            warn!(report_id = %report.id, error = %e, "failed to copy report to clipboard");
            false
        }
    }
}

/// Write the full Markdown report to `dir/error-report-<timestamp>.md`.
pub fn download_as_markdown(report: &DeepErrorReport, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(report.file_name());
    let write = || -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(&path, generate_llm_report(report))?;
        Ok(())
    };
    match write() {
        Ok(()) => {
            info!(report_id = %report.id, path = %path.display(), "report saved");
            Ok(path)
        }
        Err(e) => {
            warn!(report_id = %report.id, path = %path.display(), error = %e, "failed to save report");
            Err(e)
        }
    }
}
