//! Report configuration types.

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Default number of stack lines in the quick report.
pub const DEFAULT_QUICK_STACK_LINES: usize = 5;

/// Optional report section visibility.
///
/// Error identity, trigger and timeline are always rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSections {
    /// Runtime snapshot and environment table.
    #[serde(default = "default_true")]
    pub environment: bool,
    /// Captured console lines.
    #[serde(default = "default_true")]
    pub console: bool,
    /// Process-flow chain, visualization and stats.
    #[serde(default = "default_true")]
    pub process_flow: bool,
    /// Recently recorded user interactions.
    #[serde(default = "default_true")]
    pub interactions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReportSections {
    fn default() -> Self {
        Self {
            environment: true,
            console: true,
            process_flow: true,
            interactions: true,
        }
    }
}

/// Complete report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Custom report title.
    #[serde(default)]
    pub title: Option<String>,
    /// Section visibility.
    #[serde(default)]
    pub sections: ReportSections,
    /// Stack lines shown by the quick report.
    #[serde(default = "default_quick_stack_lines")]
    pub quick_stack_lines: usize,
    /// Append the closing analysis request to the full report.
    #[serde(default = "default_true")]
    pub closing_prompt: bool,
}

fn default_quick_stack_lines() -> usize {
    DEFAULT_QUICK_STACK_LINES
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: None,
            sections: ReportSections::default(),
            quick_stack_lines: DEFAULT_QUICK_STACK_LINES,
            closing_prompt: true,
        }
    }
}

impl ReportConfig {
    /// Create a new report configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the report title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the number of stack lines in the quick report.
    pub fn with_quick_stack_lines(mut self, lines: usize) -> Self {
        self.quick_stack_lines = lines;
        self
    }

    /// Toggle the environment section.
    pub fn with_environment(mut self, enabled: bool) -> Self {
        self.sections.environment = enabled;
        self
    }

    /// Toggle the console section.
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.sections.console = enabled;
        self
    }

    /// Toggle the process-flow section.
    pub fn with_process_flow(mut self, enabled: bool) -> Self {
        self.sections.process_flow = enabled;
        self
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.quick_stack_lines == 0 {
            return Err(ReportError::InvalidConfig(
                "quick_stack_lines must be at least 1".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ReportError::InvalidConfig(
                    "title must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Load configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReportConfig::default();
        assert_eq!(config.quick_stack_lines, 5);
        assert!(config.closing_prompt);
        assert!(config.sections.environment);
        assert!(config.sections.console);
        assert!(config.sections.process_flow);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReportConfig::new()
            .with_title("Checkout crash")
            .with_quick_stack_lines(3)
            .with_environment(false)
            .with_console(false);

        assert_eq!(config.title.as_deref(), Some("Checkout crash"));
        assert_eq!(config.quick_stack_lines, 3);
        assert!(!config.sections.environment);
        assert!(!config.sections.console);
        assert!(config.sections.process_flow);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ReportConfig::from_json(r#"{"sections": {"console": false}}"#).unwrap();
        assert!(!config.sections.console);
        assert!(config.sections.environment);
        assert_eq!(config.quick_stack_lines, DEFAULT_QUICK_STACK_LINES);
    }

    #[test]
    fn test_validation_rejects_zero_stack_lines() {
        let err = ReportConfig::from_json(r#"{"quick_stack_lines": 0}"#).unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = ReportConfig::default().with_title("t");
        let json = config.to_json().unwrap();
        let parsed = ReportConfig::from_json(&json).unwrap();
        assert_eq!(parsed.title, config.title);
    }
}
