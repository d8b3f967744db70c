//! Size-capped, failure-proof conversion of arbitrary values to JSON.
//!
//! Every value headed for a durable log passes through [`ValueSanitizer`].
//! Sanitization never fails: values that cannot be serialized, or whose
//! serialized form is too large, are replaced by a fixed placeholder string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io;

use crate::detect::scrub_secrets;

/// Placeholder for values whose serialization failed (e.g. cyclic data).
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[Unserializable value]";

/// Placeholder for values whose serialized form exceeds the cap.
pub const TOO_LARGE_PLACEHOLDER: &str = "[Value too large]";

/// Default cap for state-change values (serialized characters).
pub const DEFAULT_MAX_VALUE_LEN: usize = 1000;

/// Default cap for individual metadata values (serialized characters).
pub const DEFAULT_MAX_METADATA_VALUE_LEN: usize = 65536;

/// Deepest array/object nesting accepted before a value counts as
/// unserializable. Self-referencing data hits this (or the size cap) long
/// before the stack runs out.
pub const MAX_NESTING_DEPTH: usize = 64;

/// What sanitization did to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Passed through unchanged.
    Kept,
    /// Embedded secrets were replaced with a marker.
    Scrubbed,
    /// Replaced because the serialized form exceeded the cap.
    TooLarge,
    /// Replaced because serialization failed.
    Unserializable,
}

/// Result of a sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedValue {
    /// The value safe to store.
    pub value: Value,
    pub outcome: Outcome,
}

impl SanitizedValue {
    fn kept(value: Value) -> Self {
        Self {
            value,
            outcome: Outcome::Kept,
        }
    }

    fn placeholder(outcome: Outcome) -> Self {
        let text = match outcome {
            Outcome::Unserializable => UNSERIALIZABLE_PLACEHOLDER,
            _ => TOO_LARGE_PLACEHOLDER,
        };
        Self {
            value: Value::String(text.to_string()),
            outcome,
        }
    }

    /// Whether the stored value differs from the input.
    pub fn was_modified(&self) -> bool {
        self.outcome != Outcome::Kept
    }
}

/// Converts values to bounded JSON.
#[derive(Debug, Clone)]
pub struct ValueSanitizer {
    /// Cap applied by [`ValueSanitizer::sanitize`].
    max_value_len: usize,
    /// Cap applied per entry by [`ValueSanitizer::sanitize_metadata`].
    max_metadata_value_len: usize,
}

impl ValueSanitizer {
    pub fn new(max_value_len: usize, max_metadata_value_len: usize) -> Self {
        Self {
            max_value_len,
            max_metadata_value_len,
        }
    }

    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    /// Sanitize a value for storage as a state snapshot.
    ///
    /// The value is serialized once into a capped buffer; serialization
    /// errors, excessive nesting and oversize output all degrade to a
    /// placeholder without the full value ever being built.
    pub fn sanitize<T: Serialize + ?Sized>(&self, value: &T) -> SanitizedValue {
        let bytes = match measure(value, self.max_value_len) {
            Ok(bytes) => bytes,
            Err(outcome) => return SanitizedValue::placeholder(outcome),
        };
        match serde_json::from_slice(&bytes) {
            Ok(json) => finish(json),
            Err(_) => SanitizedValue::placeholder(Outcome::Unserializable),
        }
    }

    /// Sanitize every entry of a metadata map.
    ///
    /// Each entry is capped independently and string leaves are scrubbed
    /// for embedded secrets.
    pub fn sanitize_metadata(&self, metadata: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        metadata
            .into_iter()
            .map(|(key, value)| {
                let bounded = self.bound(value, self.max_metadata_value_len);
                (key, bounded.value)
            })
            .collect()
    }

    fn bound(&self, value: Value, cap: usize) -> SanitizedValue {
        match measure(&value, cap) {
            Ok(_) => finish(value),
            Err(outcome) => SanitizedValue::placeholder(outcome),
        }
    }
}

fn finish(value: Value) -> SanitizedValue {
    let (value, scrubbed) = scrub_value(value);
    if scrubbed {
        SanitizedValue {
            value,
            outcome: Outcome::Scrubbed,
        }
    } else {
        SanitizedValue::kept(value)
    }
}

/// Serialize into a buffer that refuses to grow past `cap` characters or
/// [`MAX_NESTING_DEPTH`] levels.
fn measure<T: Serialize + ?Sized>(value: &T, cap: usize) -> Result<Vec<u8>, Outcome> {
    let mut writer = CappedWriter::new(cap);
    match serde_json::to_writer(&mut writer, value) {
        Ok(()) => Ok(writer.buf),
        Err(_) => Err(writer.failure.unwrap_or(Outcome::Unserializable)),
    }
}

/// JSON sink that tracks character count and bracket depth as bytes arrive.
struct CappedWriter {
    buf: Vec<u8>,
    cap: usize,
    chars: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    failure: Option<Outcome>,
}

impl CappedWriter {
    fn new(cap: usize) -> Self {
        Self {
            buf: Vec::new(),
            cap,
            chars: 0,
            depth: 0,
            in_string: false,
            escaped: false,
            failure: None,
        }
    }

    fn reject(&mut self, outcome: Outcome) -> io::Error {
        self.failure = Some(outcome);
        io::Error::other("value exceeds sanitizer limits")
    }

    fn scan(&mut self, byte: u8) -> Result<(), Outcome> {
        // continuation bytes do not start a character
        if byte & 0xC0 != 0x80 {
            self.chars += 1;
            if self.chars > self.cap {
                return Err(Outcome::TooLarge);
            }
        }
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return Ok(());
        }
        match byte {
            b'"' => self.in_string = true,
            b'{' | b'[' => {
                self.depth += 1;
                if self.depth > MAX_NESTING_DEPTH {
                    return Err(Outcome::Unserializable);
                }
            }
            b'}' | b']' => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        Ok(())
    }
}

impl io::Write for CappedWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if let Some(outcome) = self.failure {
            return Err(self.reject(outcome));
        }
        for &byte in bytes {
            if let Err(outcome) = self.scan(byte) {
                return Err(self.reject(outcome));
            }
        }
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for ValueSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_LEN, DEFAULT_MAX_METADATA_VALUE_LEN)
    }
}

/// Scrub secrets from every string leaf. Returns whether anything changed.
fn scrub_value(value: Value) -> (Value, bool) {
    match value {
        Value::String(s) => match scrub_secrets(&s) {
            std::borrow::Cow::Borrowed(_) => (Value::String(s), false),
            std::borrow::Cow::Owned(clean) => (Value::String(clean), true),
        },
        Value::Array(items) => {
            let mut changed = false;
            let items = items
                .into_iter()
                .map(|item| {
                    let (v, c) = scrub_value(item);
                    changed |= c;
                    v
                })
                .collect();
            (Value::Array(items), changed)
        }
        Value::Object(map) => {
            let mut changed = false;
            let map = map
                .into_iter()
                .map(|(k, item)| {
                    let (v, c) = scrub_value(item);
                    changed |= c;
                    (k, v)
                })
                .collect();
            (Value::Object(map), changed)
        }
        other => (other, false),
    }
}
