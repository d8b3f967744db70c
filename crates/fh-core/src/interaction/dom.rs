//! Raw interaction input fed by the host UI layer.
//!
//! These types carry whatever the host observed, including raw input
//! values. The recorder reduces them to sanitized records and drops the
//! raw event.

use fh_common::{InteractionKind, Position};

/// Element an interaction targeted, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomTarget {
    pub tag_name: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    pub text_content: Option<String>,
}

impl DomTarget {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_string(),
            ..Default::default()
        }
    }

    /// Scroll target.
    pub fn document() -> Self {
        Self::new("document")
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_type(mut self, input_type: &str) -> Self {
        self.input_type = Some(input_type.to_string());
        self
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text_content = Some(text.to_string());
        self
    }
}

/// One raw interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub kind: InteractionKind,
    pub target: DomTarget,
    /// Cursor position for clicks, scroll offset for scrolls.
    pub position: Option<Position>,
    pub key: Option<String>,
    /// Raw value of an input or change. Never stored.
    pub value: Option<String>,
}

impl DomEvent {
    pub fn new(kind: InteractionKind, target: DomTarget) -> Self {
        Self {
            kind,
            target,
            position: None,
            key: None,
            value: None,
        }
    }

    pub fn click(target: DomTarget, x: f64, y: f64) -> Self {
        Self {
            position: Some(Position { x, y }),
            ..Self::new(InteractionKind::Click, target)
        }
    }

    pub fn input(target: DomTarget, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(InteractionKind::Input, target)
        }
    }

    pub fn change(target: DomTarget, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(InteractionKind::Change, target)
        }
    }

    pub fn focus(target: DomTarget) -> Self {
        Self::new(InteractionKind::Focus, target)
    }

    pub fn blur(target: DomTarget) -> Self {
        Self::new(InteractionKind::Blur, target)
    }

    pub fn keydown(target: DomTarget, key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(InteractionKind::Keydown, target)
        }
    }

    pub fn submit(target: DomTarget) -> Self {
        Self::new(InteractionKind::Submit, target)
    }

    pub fn scroll(x: f64, y: f64) -> Self {
        Self {
            position: Some(Position { x, y }),
            ..Self::new(InteractionKind::Scroll, DomTarget::document())
        }
    }
}
