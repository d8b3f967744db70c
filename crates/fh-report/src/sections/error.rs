//! Error identity and call-site data.

use fh_common::CapturedError;
use serde::{Deserialize, Serialize};

/// The failure being reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSection {
    /// Error type name.
    pub name: String,
    /// Error message.
    pub message: String,
    /// Raw stack text as captured.
    pub stack: Option<String>,
    /// Cause chain rendered as `name: message`, nearest first.
    #[serde(default)]
    pub causes: Vec<String>,
}

impl ErrorSection {
    /// Build from a captured error.
    pub fn from_captured(error: &CapturedError) -> Self {
        Self {
            name: error.name.clone(),
            message: error.message.clone(),
            stack: error.stack.clone(),
            causes: error.causes().map(|c| c.to_string()).collect(),
        }
    }

    /// Non-empty stack lines, without the leading `Name: message` header
    /// that V8-style stacks repeat.
    pub fn stack_lines(&self) -> Vec<&str> {
        let Some(stack) = self.stack.as_deref() else {
            return Vec::new();
        };
        let header = format!("{}: {}", self.name, self.message);
        stack
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .filter(|(i, l)| !(*i == 0 && *l == header))
            .map(|(_, l)| l)
            .collect()
    }

    /// `Name: message` headline.
    pub fn headline(&self) -> String {
        format!("{}: {}", self.name, self.message)
    }
}

/// Where the failure surfaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Caller-supplied context, usually the component or view name.
    pub component: Option<String>,
    /// Function of the origin frame.
    pub function: Option<String>,
    /// Source file of the origin frame.
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CallSite {
    /// Whether a stack frame was parsed.
    pub fn has_origin(&self) -> bool {
        self.file.is_some()
    }

    /// `file:line:column` with whatever parts are known.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{}:{}:{}", file, line, col),
            (Some(line), None) => format!("{}:{}", file, line),
            _ => file.to_string(),
        })
    }

    /// `file:line` for the quick report.
    pub fn file_line(&self) -> String {
        match (self.file.as_deref(), self.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.to_string(),
            _ => "unknown".to_string(),
        }
    }
}
