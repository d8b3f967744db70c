//! Ambient client context injected into every event.

use serde::{Deserialize, Serialize};

/// Viewport (or terminal) dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Page visibility of the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        }
    }
}

/// Derived metadata the event bus adds to each event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientContext {
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
    /// Current location (route or URL), updated by navigation tracking.
    pub location: String,
    pub online: bool,
    pub visibility: Visibility,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            viewport: None,
            location: "/".to_string(),
            online: true,
            visibility: Visibility::Visible,
        }
    }
}

/// `fh-telemetry/<version> (<os>; <arch>)`
pub fn default_user_agent() -> String {
    format!(
        "fh-telemetry/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
