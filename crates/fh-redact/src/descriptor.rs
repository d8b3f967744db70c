//! Privacy-preserving descriptions of user input.
//!
//! Raw input values are never retained: they are reduced to a length
//! descriptor before any record is built.

use crate::detect::scrub_secrets;

/// Placeholder for input values longer than the input cap.
pub const VALUE_TOO_LONG: &str = "[Value too long]";

/// Default cap for input values (characters).
pub const DEFAULT_MAX_INPUT_LEN: usize = 100;

/// Default cap for element text content (characters).
pub const DEFAULT_MAX_TEXT_LEN: usize = 50;

/// Describe an input value without retaining it.
///
/// Returns [`VALUE_TOO_LONG`] above `max_len` characters, else `[N chars]`.
pub fn describe_input(value: &str, max_len: usize) -> String {
    let len = value.chars().count();
    if len > max_len {
        VALUE_TOO_LONG.to_string()
    } else {
        format!("[{} chars]", len)
    }
}

/// Collapse whitespace, cut to `max_chars` characters and scrub secrets.
///
/// Returns `None` for text that is empty after trimming.
pub fn truncate_text(text: &str, max_chars: usize) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let cut: String = collapsed.chars().take(max_chars).collect();
    Some(scrub_secrets(&cut).into_owned())
}

/// Describe a pressed key.
///
/// Named keys (`Enter`, `Tab`, `ArrowDown`, ...) are kept; single printable
/// characters are masked so typed content cannot be reconstructed.
pub fn describe_key(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(' '), None) => "Space".to_string(),
        (Some(c), None) if !c.is_control() => "[char]".to_string(),
        _ => key.to_string(),
    }
}
