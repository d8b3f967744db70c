//! Sanitization for FinanceHub telemetry.
//!
//! Everything that enters a durable telemetry log passes through this
//! crate first.
//!
//! # Key Features
//!
//! - **Bounded values**: [`ValueSanitizer`] serializes arbitrary values once,
//!   replacing oversized or unserializable ones with a fixed placeholder.
//! - **Input descriptors**: raw input values are reduced to `[N chars]`
//!   descriptors and never stored.
//! - **Secret scrubbing**: credentials, tokens and card numbers found in
//!   free text are replaced with `[REDACTED]`.
//! - **Never fails**: no function in this crate returns an error.
//!
//! # Example
//!
//! ```
//! use fh_redact::{describe_input, ValueSanitizer, TOO_LARGE_PLACEHOLDER};
//!
//! let sanitizer = ValueSanitizer::default();
//! let big = vec![0u8; 2000];
//! assert_eq!(sanitizer.sanitize(&big).value, TOO_LARGE_PLACEHOLDER);
//! assert_eq!(describe_input("hunter2", 100), "[7 chars]");
//! ```

pub mod descriptor;
pub mod detect;
pub mod sanitize;

pub use descriptor::{
    describe_input, describe_key, truncate_text, DEFAULT_MAX_INPUT_LEN, DEFAULT_MAX_TEXT_LEN,
    VALUE_TOO_LONG,
};
pub use detect::{detect, find_all_secrets, scrub_secrets, Detection, SecretType, REDACTED_MARKER};
pub use sanitize::{
    Outcome, SanitizedValue, ValueSanitizer, DEFAULT_MAX_METADATA_VALUE_LEN,
    DEFAULT_MAX_VALUE_LEN, MAX_NESTING_DEPTH, TOO_LARGE_PLACEHOLDER, UNSERIALIZABLE_PLACEHOLDER,
};
