//! Owned snapshot of a failure.
//!
//! Errors flow through the tracker and the analyzer long after the original
//! `std::error::Error` value is gone, so they are captured into a plain,
//! comparable, serializable record. The `source()` chain becomes the
//! `cause` chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum depth of the captured `cause` chain.
const MAX_CAUSE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedError {
    /// Error type name (e.g. `TypeError`, `ApiError`, `io::Error`).
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CapturedError>>,
}

impl CapturedError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        CapturedError {
            name: name.into(),
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Plain `Error` with a message, mirroring a generic thrown error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Capture any error value, walking its `source()` chain into causes.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut root = CapturedError::new(short_type_name::<E>(), err.to_string());
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(inner) = source {
            if causes.len() >= MAX_CAUSE_DEPTH {
                break;
            }
            causes.push(CapturedError::new("Error", inner.to_string()));
            source = inner.source();
        }
        root.cause = causes.into_iter().rev().fold(None, |acc, mut cause| {
            cause.cause = acc;
            Some(Box::new(cause))
        });
        root
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_cause(mut self, cause: CapturedError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Capture the current thread's backtrace as the stack.
    pub fn with_backtrace(self) -> Self {
        let bt = std::backtrace::Backtrace::force_capture();
        self.with_stack(bt.to_string())
    }

    /// Iterate the cause chain, nearest cause first.
    pub fn causes(&self) -> impl Iterator<Item = &CapturedError> {
        std::iter::successors(self.cause.as_deref(), |c| c.cause.as_deref())
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for CapturedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

fn short_type_name<E: ?Sized>() -> String {
    let full = std::any::type_name::<E>();
    // Drop generic arguments; trait objects carry no useful name.
    let base = full.split('<').next().unwrap_or(full);
    if base.starts_with("dyn ") {
        return "Error".to_string();
    }
    let segments: Vec<&str> = base.split("::").collect();
    let last = segments.last().copied().unwrap_or(base);
    if last != "Error" {
        return last.to_string();
    }
    // `std::io::error::Error` reads better as `io::Error`.
    match segments
        .iter()
        .rev()
        .skip(1)
        .find(|s| !s.eq_ignore_ascii_case(last))
    {
        Some(module) => format!("{}::{}", module, last),
        None => last.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "failed to load ledger")
        }
    }

    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let captured = CapturedError::from_error(&err);
        assert_eq!(captured.name, "io::Error");
        assert_eq!(captured.message, "missing");
        assert!(captured.cause.is_none());
    }

    #[test]
    fn test_source_chain_becomes_cause() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let captured = CapturedError::from_error(&err);
        assert_eq!(captured.name, "Outer");
        assert_eq!(captured.message, "failed to load ledger");
        let causes: Vec<_> = captured.causes().collect();
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].message, "denied");
    }

    #[test]
    fn test_display_and_builders() {
        let err = CapturedError::message("boom")
            .with_stack("at render (app.js:1:1)")
            .with_cause(CapturedError::new("TypeError", "x is undefined"));
        assert_eq!(err.to_string(), "Error: boom");
        assert_eq!(err.stack.as_deref(), Some("at render (app.js:1:1)"));
        assert_eq!(err.causes().count(), 1);
    }

    #[test]
    fn test_serialization_skips_empty() {
        let json = serde_json::to_string(&CapturedError::message("boom")).unwrap();
        assert_eq!(json, r#"{"name":"Error","message":"boom"}"#);
    }
}
