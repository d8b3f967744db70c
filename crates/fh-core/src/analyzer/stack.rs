//! Best-effort stack trace parsing.
//!
//! Understands three frame shapes:
//! - V8: `at fn (file:line:col)` and anonymous `at file:line:col`
//! - Gecko: `fn@file:line:col`
//! - Rust backtraces: `N: path::to::fn` followed by `at file:line:col`
//!
//! Anything else is skipped. An unparsable stack yields no frames.

use fh_common::CapturedError;
use fh_report::CallSite;
use once_cell::sync::Lazy;
use regex::Regex;

static V8_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?:(?P<func>.+?)\s+\()?(?P<file>[^()\s]+?):(?P<line>\d+):(?P<col>\d+)\)?\s*$")
        .unwrap()
});

static GECKO_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<func>[^@\s]*)@(?P<file>.+?):(?P<line>\d+):(?P<col>\d+)\s*$").unwrap()
});

static RUST_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+:\s+(?P<func>\S.*?)\s*$").unwrap());

static RUST_LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?P<file>.+?):(?P<line>\d+)(?::(?P<col>\d+))?\s*$").unwrap()
});

static URL_ORIGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://[^/]*").unwrap());

/// Runtime and telemetry frames skipped when locating the origin.
const INTERNAL_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "<std::",
    "<core::",
    "<alloc::",
    "backtrace::",
    "rust_begin_unwind",
    "__rust",
    "__libc",
    "_start",
    "fh_common::",
    "fh_telemetry::",
    "fh_core::analyzer",
];

/// One parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: Option<String>,
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
}

impl StackFrame {
    fn is_internal(&self) -> bool {
        self.function
            .as_deref()
            .is_some_and(|f| INTERNAL_PREFIXES.iter().any(|p| f.starts_with(p)))
    }

    /// Owning type or module of the function, e.g. `TransactionsView` for
    /// `TransactionsView.render` or `transactions` for `app::transactions::load`.
    pub fn owner(&self) -> Option<&str> {
        let function = self.function.as_deref()?;
        if let Some((path, _)) = function.rsplit_once("::") {
            return path.rsplit("::").next().filter(|s| !s.is_empty());
        }
        function
            .rsplit_once('.')
            .map(|(owner, _)| owner.rsplit('.').next().unwrap_or(owner))
            .filter(|s| !s.is_empty() && *s != "Object")
    }
}

/// Parse every recognizable frame, outermost call last.
pub fn parse_frames(stack: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    let mut rust_function: Option<String> = None;

    for line in stack.lines() {
        if let Some(function) = rust_function.take() {
            if let Some(caps) = RUST_LOCATION.captures(line) {
                if let Ok(line_no) = caps["line"].parse() {
                    frames.push(StackFrame {
                        function: Some(strip_rust_hash(&function).to_string()),
                        file: caps["file"].to_string(),
                        line: line_no,
                        column: caps.name("col").and_then(|c| c.as_str().parse().ok()),
                    });
                }
                continue;
            }
        }

        if let Some(caps) = RUST_HEADER.captures(line) {
            rust_function = Some(caps["func"].to_string());
            continue;
        }

        let caps = V8_FRAME
            .captures(line)
            .or_else(|| GECKO_FRAME.captures(line));
        if let Some(caps) = caps {
            let Ok(line_no) = caps["line"].parse() else {
                continue;
            };
            frames.push(StackFrame {
                function: caps
                    .name("func")
                    .map(|f| f.as_str().trim().to_string())
                    .filter(|f| !f.is_empty()),
                file: strip_origin(&caps["file"]),
                line: line_no,
                column: caps["col"].parse().ok(),
            });
        }
    }
    frames
}

/// First frame outside runtime and telemetry internals.
pub fn origin_frame(stack: &str) -> Option<StackFrame> {
    let frames = parse_frames(stack);
    frames
        .iter()
        .find(|f| !f.is_internal())
        .or_else(|| frames.first())
        .cloned()
}

/// Call site of `error` as seen from `context` (component name, may be empty).
pub fn call_site(error: &CapturedError, context: &str) -> CallSite {
    let frame = error.stack.as_deref().and_then(origin_frame);
    let component = Some(context.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| frame.as_ref().and_then(|f| f.owner()).map(str::to_string));
    match frame {
        Some(frame) => CallSite {
            component,
            function: frame.function,
            file: Some(frame.file),
            line: Some(frame.line),
            column: frame.column,
        },
        None => CallSite {
            component,
            ..CallSite::default()
        },
    }
}

fn strip_origin(file: &str) -> String {
    URL_ORIGIN.replace(file, "").into_owned()
}

/// Drop the `::h0123abcd` disambiguator rustc appends to symbol names.
fn strip_rust_hash(function: &str) -> &str {
    match function.rsplit_once("::h") {
        Some((path, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            path
        }
        _ => function,
    }
}
