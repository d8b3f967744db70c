//! Recorded user interactions.
//!
//! Interaction records never hold raw user input: values are reduced to
//! length descriptors before a record is built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::InteractionId;

/// Kind of DOM interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Click,
    Input,
    Focus,
    Blur,
    Keydown,
    Change,
    Submit,
    Scroll,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Click => "click",
            InteractionKind::Input => "input",
            InteractionKind::Focus => "focus",
            InteractionKind::Blur => "blur",
            InteractionKind::Keydown => "keydown",
            InteractionKind::Change => "change",
            InteractionKind::Submit => "submit",
            InteractionKind::Scroll => "scroll",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cursor or scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Description of the element an interaction targeted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub tag_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Truncated, scrubbed text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
}

impl TargetDescriptor {
    /// Compact CSS-like selector, e.g. `button#save.btn-primary`.
    pub fn selector(&self) -> String {
        let mut out = self.tag_name.to_ascii_lowercase();
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            out.push('#');
            out.push_str(id);
        }
        if let Some(class) = self.class_name.as_deref() {
            if let Some(first) = class.split_whitespace().next() {
                out.push('.');
                out.push_str(first);
            }
        }
        if let Some(name) = self.name.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("[name={}]", name));
        }
        out
    }
}

/// One captured interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: InteractionId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub kind: InteractionKind,
    pub target: TargetDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Length descriptor of the input value, never the raw value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_value: Option<String>,
}
